//! Popup and panel display state.
//!
//! Two independent slots, each published through a `watch` channel so any
//! number of renderers can follow them. A selection drives exactly one slot,
//! picked by viewport width at the moment of the event. Nothing here forces
//! the two slots to be exclusive; renderers hide one when they show the other.

use crate::DictionaryEntry;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// Viewports at least this wide show the side panel instead of the popup.
pub const PANEL_BREAKPOINT: f64 = 1024.0;

/// On-screen bounding box of the element a word was selected from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Anything that can report where it sits on screen.
pub trait BoundingBox {
    /// `None` when the element is detached or not laid out.
    fn bounding_rect(&self) -> Option<Rect>;
}

impl BoundingBox for Rect {
    fn bounding_rect(&self) -> Option<Rect> {
        Some(*self)
    }
}

/// Popup attachment point: horizontal centre, top edge and bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
    pub bottom: f64,
}

impl Anchor {
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            x: rect.left + rect.width / 2.0,
            y: rect.top,
            bottom: rect.top + rect.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PopupSlot {
    pub word: String,
    pub anchor: Anchor,
    pub visible: bool,
}

impl PopupSlot {
    pub fn is_inactive(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PanelSlot {
    pub word: String,
    pub entry: Option<DictionaryEntry>,
    pub loading: bool,
    pub visible: bool,
    #[serde(skip)]
    generation: u64,
}

impl PanelSlot {
    pub fn is_inactive(&self) -> bool {
        self.word.is_empty() && self.entry.is_none() && !self.loading && !self.visible
    }

    /// Bumped on every activation and every hide.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Proof that a panel lookup was started for `word` while the panel showed it.
///
/// Results are only applied while the ticket is current; a newer selection or
/// a hide makes it stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelTicket {
    word: String,
    generation: u64,
}

impl PanelTicket {
    pub fn word(&self) -> &str {
        &self.word
    }
}

/// The slot a selection activated.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    Popup(Anchor),
    Panel(PanelTicket),
}

pub struct PresentationCoordinator {
    popup: watch::Sender<PopupSlot>,
    panel: watch::Sender<PanelSlot>,
    panel_breakpoint: f64,
}

impl Default for PresentationCoordinator {
    fn default() -> Self {
        Self::new(PANEL_BREAKPOINT)
    }
}

impl PresentationCoordinator {
    pub fn new(panel_breakpoint: f64) -> Self {
        let (popup, _) = watch::channel(PopupSlot::default());
        let (panel, _) = watch::channel(PanelSlot::default());
        Self {
            popup,
            panel,
            panel_breakpoint,
        }
    }

    pub fn panel_breakpoint(&self) -> f64 {
        self.panel_breakpoint
    }

    pub fn popup(&self) -> PopupSlot {
        self.popup.borrow().clone()
    }

    pub fn panel(&self) -> PanelSlot {
        self.panel.borrow().clone()
    }

    pub fn subscribe_popup(&self) -> watch::Receiver<PopupSlot> {
        self.popup.subscribe()
    }

    pub fn subscribe_panel(&self) -> watch::Receiver<PanelSlot> {
        self.panel.subscribe()
    }

    /// Activates the panel (wide viewports) or the popup for `word`.
    ///
    /// The anchor is computed first on both paths; when `origin` cannot report
    /// a bounding box nothing changes and `None` is returned.
    pub fn trigger_from_selection<B: BoundingBox + ?Sized>(
        &self,
        word: &str,
        origin: &B,
        viewport_width: f64,
    ) -> Option<Surface> {
        let anchor = Anchor::from_rect(origin.bounding_rect()?);
        if viewport_width >= self.panel_breakpoint {
            debug!(word, viewport_width, "showing dictionary panel");
            Some(Surface::Panel(self.show_panel(word)))
        } else {
            debug!(word, viewport_width, "showing dictionary popup");
            self.show_popup(word, anchor);
            Some(Surface::Popup(anchor))
        }
    }

    pub fn show_popup(&self, word: &str, anchor: Anchor) {
        self.popup.send_if_modified(|slot| {
            let next = PopupSlot {
                word: word.to_string(),
                anchor,
                visible: true,
            };
            replace_if_changed(slot, next)
        });
    }

    /// Shows the panel for `word` and returns the ticket for its lookup.
    /// The previous entry is cleared so a stale definition never shows
    /// under the new word.
    pub fn show_panel(&self, word: &str) -> PanelTicket {
        let mut generation = 0;
        self.panel.send_modify(|slot| {
            slot.generation += 1;
            slot.word = word.to_string();
            slot.entry = None;
            slot.visible = true;
            generation = slot.generation;
        });
        PanelTicket {
            word: word.to_string(),
            generation,
        }
    }

    pub fn hide_popup(&self) {
        self.popup
            .send_if_modified(|slot| replace_if_changed(slot, PopupSlot::default()));
    }

    pub fn hide_panel(&self) {
        self.panel.send_if_modified(|slot| {
            if slot.is_inactive() {
                return false;
            }
            *slot = PanelSlot {
                generation: slot.generation + 1,
                ..PanelSlot::default()
            };
            true
        });
    }

    pub fn set_panel_entry(&self, entry: Option<DictionaryEntry>) {
        self.panel.send_if_modified(|slot| {
            if slot.entry == entry {
                return false;
            }
            slot.entry = entry;
            true
        });
    }

    pub fn set_panel_loading(&self, loading: bool) {
        self.panel.send_if_modified(|slot| {
            if slot.loading == loading {
                return false;
            }
            slot.loading = loading;
            true
        });
    }

    pub fn is_current(&self, ticket: &PanelTicket) -> bool {
        ticket_matches(&self.panel.borrow(), ticket)
    }

    /// Sets `loading` only if `ticket` is still current.
    pub fn set_panel_loading_for(&self, ticket: &PanelTicket, loading: bool) -> bool {
        let mut applied = false;
        self.panel.send_if_modified(|slot| {
            if !ticket_matches(slot, ticket) {
                return false;
            }
            applied = true;
            if slot.loading == loading {
                return false;
            }
            slot.loading = loading;
            true
        });
        applied
    }

    /// Stores the lookup result and clears `loading`, unless the panel has
    /// moved on to another selection or been hidden. Returns whether the
    /// result was applied.
    pub fn finish_panel_lookup(&self, ticket: &PanelTicket, entry: Option<DictionaryEntry>) -> bool {
        let mut applied = false;
        self.panel.send_if_modified(|slot| {
            if !ticket_matches(slot, ticket) {
                return false;
            }
            applied = true;
            slot.entry = entry;
            slot.loading = false;
            true
        });
        if !applied {
            debug!(word = ticket.word(), "discarding stale panel lookup result");
        }
        applied
    }
}

fn ticket_matches(slot: &PanelSlot, ticket: &PanelTicket) -> bool {
    slot.generation == ticket.generation && slot.word == ticket.word && slot.visible
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, next: T) -> bool {
    if *slot == next {
        return false;
    }
    *slot = next;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Detached;

    impl BoundingBox for Detached {
        fn bounding_rect(&self) -> Option<Rect> {
            None
        }
    }

    fn element() -> Rect {
        Rect {
            left: 100.0,
            top: 40.0,
            width: 60.0,
            height: 20.0,
        }
    }

    fn entry(word: &str) -> DictionaryEntry {
        DictionaryEntry {
            word: word.to_string(),
            definition: format!("{word} definition"),
            examples: vec![],
        }
    }

    #[test]
    fn wide_viewport_activates_only_the_panel() {
        let coordinator = PresentationCoordinator::default();
        let el = element();
        let surface = coordinator.trigger_from_selection("kurinji", &el, 1200.0);

        assert!(matches!(surface, Some(Surface::Panel(ref t)) if t.word() == "kurinji"));
        let panel = coordinator.panel();
        assert!(panel.visible);
        assert_eq!(panel.word, "kurinji");
        assert!(coordinator.popup().is_inactive());
    }

    #[test]
    fn narrow_viewport_activates_only_the_popup() {
        let coordinator = PresentationCoordinator::default();
        let el = element();
        let surface = coordinator.trigger_from_selection("kurinji", &el, 800.0);

        let expected = Anchor {
            x: 130.0,
            y: 40.0,
            bottom: 60.0,
        };
        assert_eq!(surface, Some(Surface::Popup(expected)));
        let popup = coordinator.popup();
        assert!(popup.visible);
        assert_eq!(popup.word, "kurinji");
        assert_eq!(popup.anchor, expected);
        assert!(coordinator.panel().is_inactive());
    }

    #[test]
    fn breakpoint_is_inclusive() {
        let coordinator = PresentationCoordinator::default();
        let el = element();
        let surface = coordinator.trigger_from_selection("mullai", &el, 1024.0);
        assert!(matches!(surface, Some(Surface::Panel(_))));
    }

    #[test]
    fn unresolvable_origin_changes_nothing() {
        let coordinator = PresentationCoordinator::default();
        assert!(coordinator.trigger_from_selection("mullai", &Detached, 1200.0).is_none());
        assert!(coordinator.trigger_from_selection("mullai", &Detached, 800.0).is_none());
        assert!(coordinator.popup().is_inactive());
        assert!(coordinator.panel().is_inactive());
    }

    #[test]
    fn hide_popup_twice_is_safe() {
        let coordinator = PresentationCoordinator::default();
        let el = element();
        coordinator.trigger_from_selection("palai", &el, 500.0);
        coordinator.hide_popup();
        assert!(coordinator.popup().is_inactive());
        coordinator.hide_popup();
        assert!(coordinator.popup().is_inactive());
    }

    #[test]
    fn hide_panel_resets_slot() {
        let coordinator = PresentationCoordinator::default();
        let ticket = coordinator.show_panel("neithal");
        coordinator.set_panel_loading(true);
        coordinator.set_panel_entry(Some(entry("neithal")));
        coordinator.hide_panel();
        let panel = coordinator.panel();
        assert!(panel.is_inactive());
        assert!(!coordinator.is_current(&ticket));
        coordinator.hide_panel();
        assert!(coordinator.panel().is_inactive());
    }

    #[test]
    fn late_result_for_previous_word_is_discarded() {
        let coordinator = PresentationCoordinator::default();
        let first = coordinator.show_panel("kurinji");
        coordinator.set_panel_loading_for(&first, true);
        let second = coordinator.show_panel("mullai");
        assert!(coordinator.set_panel_loading_for(&second, true));

        assert!(!coordinator.finish_panel_lookup(&first, Some(entry("kurinji"))));
        let panel = coordinator.panel();
        assert_eq!(panel.word, "mullai");
        assert!(panel.entry.is_none());
        assert!(panel.loading);

        assert!(coordinator.finish_panel_lookup(&second, Some(entry("mullai"))));
        let panel = coordinator.panel();
        assert_eq!(panel.entry, Some(entry("mullai")));
        assert!(!panel.loading);
    }

    #[test]
    fn reselecting_same_word_invalidates_older_ticket() {
        let coordinator = PresentationCoordinator::default();
        let first = coordinator.show_panel("marutham");
        let second = coordinator.show_panel("marutham");
        assert!(!coordinator.is_current(&first));
        assert!(coordinator.is_current(&second));
    }

    #[test]
    fn result_after_hide_is_discarded() {
        let coordinator = PresentationCoordinator::default();
        let ticket = coordinator.show_panel("palai");
        coordinator.hide_panel();
        assert!(!coordinator.finish_panel_lookup(&ticket, Some(entry("palai"))));
        assert!(!coordinator.set_panel_loading_for(&ticket, true));
        assert!(coordinator.panel().is_inactive());
    }

    #[tokio::test]
    async fn subscribers_see_changes_only() {
        let coordinator = PresentationCoordinator::default();
        let mut popup = coordinator.subscribe_popup();
        assert!(!popup.has_changed().unwrap());

        coordinator.hide_popup();
        assert!(!popup.has_changed().unwrap());

        coordinator.show_popup("kurinji", Anchor::default());
        popup.changed().await.unwrap();
        assert_eq!(popup.borrow_and_update().word, "kurinji");

        let mut panel = coordinator.subscribe_panel();
        coordinator.set_panel_loading(false);
        assert!(!panel.has_changed().unwrap());
        coordinator.set_panel_loading(true);
        assert!(panel.has_changed().unwrap());
    }
}
