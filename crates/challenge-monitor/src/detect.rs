use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static RESOURCE_MARKERS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "challenges.cloudflare.com",
        "/cdn-cgi/challenge-platform",
        "turnstile",
        "cf-chl",
    ]
});

static TEXT_MARKERS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "verify you are human",
        "verify you're human",
        "verify you are a human",
        "checking your browser",
        "security check",
        "are you a robot",
        "confirm you are human",
        "just a moment",
    ]
});

/// Kind of candidate element, ordered from most to least specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// The interactive widget itself (checkbox container with a site key).
    ChallengeWidget,
    /// An iframe whose source, id or title points at a challenge provider.
    ChallengeIframe,
    /// A generic overlay/container class name match.
    Container,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHint {
    pub kind: ElementKind,
    pub visible: bool,
    /// Rendered area in CSS pixels; 0 when unknown.
    #[serde(default)]
    pub area: u32,
}

/// Cheap snapshot of the page taken by the probe.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeObservation {
    /// URLs of frames/scripts currently loaded.
    #[serde(default)]
    pub resource_urls: Vec<String>,
    #[serde(default)]
    pub elements: Vec<ElementHint>,
    /// Visible text, truncated by the probe.
    #[serde(default)]
    pub text_sample: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChallengeSignals {
    pub network: bool,
    pub visible_element: bool,
    pub text: bool,
    pub specific_widget: bool,
}

impl ChallengeSignals {
    pub fn independent_count(&self) -> u8 {
        self.network as u8 + self.visible_element as u8 + self.text as u8
    }

    /// Two independent signals, or one visible interactive widget. A single
    /// incidental text or URL match is not enough.
    pub fn detected(&self) -> bool {
        self.specific_widget || self.independent_count() >= 2
    }
}

pub fn detect(observation: &ChallengeObservation) -> ChallengeSignals {
    let network = observation.resource_urls.iter().any(|url| {
        let url = url.to_ascii_lowercase();
        RESOURCE_MARKERS.iter().any(|marker| url.contains(marker))
    });
    let visible_element = observation.elements.iter().any(|el| el.visible);
    let specific_widget = observation
        .elements
        .iter()
        .any(|el| el.visible && el.kind == ElementKind::ChallengeWidget);
    let text_lower = observation.text_sample.to_lowercase();
    let text = !text_lower.is_empty() && TEXT_MARKERS.iter().any(|m| text_lower.contains(m));

    ChallengeSignals {
        network,
        visible_element,
        text,
        specific_widget,
    }
}
