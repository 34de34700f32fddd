//! Keyword-based justification of anomalous readings
//!
//! Scans recent news summaries for known real-world events that plausibly
//! explain an extreme value for the category (a dust storm for AQI 1000, a
//! flood for turbid water). First matching event wins.

use crate::types::{CollaboratorError, Justification, JustificationRequest, JustificationSource};
use envo_common::Category;

/// Reason recorded when nothing in the news explains the reading
pub const NO_EXTERNAL_SUPPORT: &str = "no external support found";

type EventTable = &'static [(&'static str, &'static [&'static str])];

const AIR_EVENTS: EventTable = &[
    ("dust storm", &["dust storm", "duststorm", "sandstorm", "sand storm"]),
    ("wildfire", &["wildfire", "forest fire", "bushfire"]),
    ("stubble burning", &["stubble burning", "crop burning", "farm fire"]),
    ("fireworks", &["fireworks", "firecrackers", "diwali"]),
    ("industrial accident", &["gas leak", "factory fire", "industrial fire", "explosion"]),
    ("smog", &["smog", "haze"]),
];

const WATER_EVENTS: EventTable = &[
    ("flood", &["flood", "flooding", "inundat"]),
    ("sewage overflow", &["sewage", "effluent", "overflow"]),
    ("algal bloom", &["algal bloom", "algae bloom", "red tide"]),
    ("chemical spill", &["chemical spill", "oil spill", "industrial waste"]),
];

const SOIL_EVENTS: EventTable = &[
    ("flood", &["flood", "flooding", "waterlogg"]),
    ("heavy rain", &["heavy rain", "downpour", "cloudburst", "monsoon"]),
    ("chemical spill", &["chemical spill", "contamination"]),
];

const NOISE_EVENTS: EventTable = &[
    ("construction", &["construction", "demolition"]),
    ("festival", &["festival", "procession", "concert", "celebration"]),
    ("fireworks", &["fireworks", "firecrackers"]),
    ("protest", &["protest", "rally"]),
];

const BIODIVERSITY_EVENTS: EventTable = &[
    ("migration", &["migration", "migratory", "flock"]),
    ("bloom", &["bloom", "swarm", "mass sighting"]),
];

const WASTE_EVENTS: EventTable = &[
    ("sanitation strike", &["strike", "garbage crisis"]),
    ("landfill fire", &["landfill fire", "dump fire"]),
    ("festival", &["festival", "mela"]),
];

const WEATHER_EVENTS: EventTable = &[
    ("heatwave", &["heatwave", "heat wave", "record temperature"]),
    ("cold wave", &["cold wave", "cold snap", "frost"]),
    ("cyclone", &["cyclone", "hurricane", "typhoon", "storm"]),
];

const RADIATION_EVENTS: EventTable = &[
    ("heatwave", &["heatwave", "heat wave", "uv alert", "uv index"]),
    ("radiation leak", &["radiation leak", "nuclear"]),
];

/// (event type, keywords) per category, most specific first
fn events_for(category: Category) -> EventTable {
    match category {
        Category::Air => AIR_EVENTS,
        Category::Water => WATER_EVENTS,
        Category::Soil => SOIL_EVENTS,
        Category::Noise => NOISE_EVENTS,
        Category::Biodiversity => BIODIVERSITY_EVENTS,
        Category::Waste => WASTE_EVENTS,
        Category::Weather => WEATHER_EVENTS,
        Category::Radiation => RADIATION_EVENTS,
    }
}

/// Matches news text against event keywords for the category
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordJustifier;

impl KeywordJustifier {
    pub fn new() -> Self {
        Self
    }

    pub fn judge(&self, request: &JustificationRequest) -> Justification {
        let events = events_for(request.category);
        for item in &request.news {
            let text = format!(
                "{} {}",
                item.title,
                item.description.as_deref().unwrap_or_default()
            )
            .to_lowercase();

            let matched = events
                .iter()
                .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)));
            if let Some((event, _)) = matched {
                let source = item.source.as_deref().unwrap_or("news");
                return Justification::justified(
                    format!("{} reported by {}: {}", event, source, item.title),
                    *event,
                );
            }
        }
        Justification::not_justified(NO_EXTERNAL_SUPPORT)
    }
}

#[async_trait::async_trait]
impl JustificationSource for KeywordJustifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn justify(&self, request: &JustificationRequest) -> Result<Justification, CollaboratorError> {
        Ok(self.judge(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewsSummary;

    fn headline(title: &str) -> NewsSummary {
        NewsSummary {
            title: title.to_string(),
            description: None,
            source: Some("Wire".to_string()),
            published_at: None,
            url: None,
        }
    }

    fn request(category: Category, news: Vec<NewsSummary>) -> JustificationRequest {
        JustificationRequest {
            category,
            latitude: 26.9,
            longitude: 75.8,
            value: 1000.0,
            news,
        }
    }

    #[test]
    fn test_dust_storm_justifies_air_spike() {
        let judged = KeywordJustifier::new().judge(&request(
            Category::Air,
            vec![headline("Markets reopen"), headline("Massive Dust Storm sweeps Rajasthan")],
        ));
        assert!(judged.justified);
        assert_eq!(judged.event_type.as_deref(), Some("dust storm"));
        assert!(judged.reason.contains("dust storm"));
    }

    #[test]
    fn test_keywords_are_category_specific() {
        let judged = KeywordJustifier::new().judge(&request(
            Category::Air,
            vec![headline("Flood waters recede in Assam")],
        ));
        assert!(!judged.justified);
        assert_eq!(judged.reason, NO_EXTERNAL_SUPPORT);
    }

    #[test]
    fn test_description_is_searched() {
        let mut item = headline("City update");
        item.description = Some("Sewage overflow reported near the lake".to_string());
        let judged = KeywordJustifier::new().judge(&request(Category::Water, vec![item]));
        assert_eq!(judged.event_type.as_deref(), Some("sewage overflow"));
    }

    #[test]
    fn test_no_news_not_justified() {
        assert!(!KeywordJustifier::new().judge(&request(Category::Noise, vec![])).justified);
    }
}
