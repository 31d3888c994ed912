use super::types::{GroundingChunk, MapInfo};

/// Most nearby places kept from one grounded answer.
pub const MAX_NEARBY_PLACES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundingSplit {
    pub sources: Vec<GroundingChunk>,
    pub map_info: Option<MapInfo>,
    pub nearby_places: Vec<GroundingChunk>,
}

/// Sort the citations of an enrichment answer.
///
/// Web chunks become sources. The first map chunk whose title matches `name`
/// (either containing the other, case-insensitive) is the place itself; the
/// remaining map chunks are treated as nearby recommendations.
pub fn split_grounding(name: &str, chunks: Vec<GroundingChunk>) -> GroundingSplit {
    let needle = name.to_lowercase();

    let (sources, maps): (Vec<_>, Vec<_>) = chunks
        .into_iter()
        .filter(|c| c.web.is_some() || c.maps.is_some())
        .partition(|c| c.web.is_some());

    let primary = maps.iter().position(|c| {
        c.maps
            .as_ref()
            .map(|m| titles_match(&m.title.to_lowercase(), &needle))
            .unwrap_or(false)
    });

    let map_info = primary.and_then(|i| maps[i].maps.as_ref()).map(|m| MapInfo {
        uri: Some(m.uri.clone()),
        ..MapInfo::default()
    });

    let nearby_places = maps
        .into_iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != primary)
        .map(|(_, c)| c)
        .take(MAX_NEARBY_PLACES)
        .collect();

    GroundingSplit {
        sources,
        map_info,
        nearby_places,
    }
}

fn titles_match(title: &str, name: &str) -> bool {
    if title.is_empty() || name.is_empty() {
        return false;
    }
    title.contains(name) || name.contains(title)
}
