use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::detect::{ChallengeObservation, ElementKind};

/// Handle to a candidate element, opaque to the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterstitialElement {
    pub id: String,
    pub kind: ElementKind,
    pub visible: bool,
    pub area: u32,
}

/// Ways to deliver an activation, tried in order until one is acknowledged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// Pointer events at the element centre.
    Pointer,
    /// Legacy mouse events at the element centre.
    Mouse,
    /// Direct synthetic activation of the element.
    Synthetic,
}

impl DispatchStrategy {
    pub const ALL: [DispatchStrategy; 3] = [
        DispatchStrategy::Pointer,
        DispatchStrategy::Mouse,
        DispatchStrategy::Synthetic,
    ];
}

/// Host-bound capability used by the monitor. Implementations must be
/// cheap and must not touch the network.
#[async_trait]
pub trait ChallengeProbe: Send + Sync {
    async fn observe(&self) -> ChallengeObservation;

    async fn candidates(&self) -> Vec<InterstitialElement>;

    async fn find_interstitial_element(&self) -> Option<InterstitialElement> {
        most_specific(self.candidates().await)
    }

    async fn scroll_into_view(&self, element: &InterstitialElement);

    /// Returns `true` when the element registered the activation.
    async fn dispatch_activation(
        &self,
        element: &InterstitialElement,
        strategy: DispatchStrategy,
    ) -> bool;
}

/// Visible candidates only; widget before iframe before container, larger
/// area first within a kind.
pub fn most_specific(candidates: Vec<InterstitialElement>) -> Option<InterstitialElement> {
    candidates
        .into_iter()
        .filter(|el| el.visible)
        .min_by(|a, b| a.kind.cmp(&b.kind).then(b.area.cmp(&a.area)))
}
