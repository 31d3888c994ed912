use crate::services::types::Coordinates;

pub fn identify(location: Option<Coordinates>) -> String {
    let location_context = match location {
        Some(at) => format!(
            "The user is currently located at coordinates: Latitude {}, Longitude {}. \
             Use this location data to accurately confirm the identity of the landmark \
             visible in the image, especially if it looks similar to other landmarks.",
            at.lat, at.lng
        ),
        None => String::new(),
    };

    format!(
        "Identify the landmark, building, or location in this image.\n\
         {}\n\
         Return the name in English.\n\
         Return ONLY the name of the place.\n\
         If it is not a recognized landmark, provide a short descriptive title of what is visible.\n\
         Do not add periods or extra words like \"This is...\".",
        location_context
    )
}

pub fn details(name: &str) -> String {
    format!(
        "Provide a fascinating, historical, and engaging summary of \"{name}\".\n\
         Focus on interesting facts suitable for a tourist audio guide (approx 100 words).\n\
         Provide the response in English.\n\n\
         ALSO, use Google Maps to:\n\
         1. Find the official rating and address of \"{name}\".\n\
         2. Find 3 interesting places nearby (cafes, museums, or parks) that a tourist might like to visit next.\n\n\
         Do not use markdown formatting like bold or headers in the description.",
        name = name
    )
}

pub fn suggestions(at: Coordinates) -> String {
    format!(
        "Act as a premium travel editor and concierge. I am located at {}, {}.\n\
         Find 4-5 distinct, high-quality places nearby (landmarks, cafes, parks, or hidden gems).\n\
         Output in English.\n\n\
         You MUST return a valid JSON object with the following structure:\n\
         {{\n  \"title\": \"A catchy title for this collection\",\n  \
         \"introduction\": \"A short, atmospheric intro to the neighborhood (max 2 sentences)\",\n  \
         \"recommendations\": [\n    {{\n      \"name\": \"The exact name of the place\",\n      \
         \"type\": \"A short category (e.g. Coffee Shop, Park, Historical Site)\",\n      \
         \"description\": \"An elegant, evocative sentence describing why it's special\"\n    }}\n  ]\n}}\n\n\
         Ensure the response is raw JSON without Markdown formatting.\n\
         Use Google Maps to verify these real places.",
        at.lat, at.lng
    )
}
