//! Event handling and state transition logic.
//!
//! Every input the scheduler reacts to arrives as an [`Event`]: engine
//! viewability reports, focus changes, mount lifecycle, player signals, feed
//! data changes, user intents and collaborator completions. [`handle_event`]
//! applies exactly one event to [`FeedState`] and returns the actions the host
//! must execute, together with a flag telling it whether anything it renders
//! may have changed.
//!
//! Events are processed one at a time in arrival order (see
//! [`super::EventQueue`]); no event observes another half-applied.

use crate::app::{Action, FeedState};
use crate::domain::{FeedItem, ItemId, Result, ViewabilityEvent};
use crate::feed::ContentPage;
use crate::player::PlayerSignal;
use crate::scheduler::Intent;
use crate::worker::WorkerResponse;
use serde::{Deserialize, Serialize};

/// Inputs to the scheduler.
///
/// Serialized externally tagged in `snake_case`, so a JSON line such as
/// `{"focus_changed":{"has_focus":false}}` or `"scrolled_away"` is one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// The engine reported which items are visible and by how much.
    Viewability(ViewabilityEvent),
    /// A timer fired; re-evaluate pending dwell at this time.
    Tick { timestamp_ms: u64 },
    /// The list scrolled far from every tracked item.
    ScrolledAway,

    /// The hosting screen gained or lost focus.
    FocusChanged { has_focus: bool },

    /// The engine started rendering this item.
    Mounted { item_id: ItemId },
    /// The engine stopped rendering this item.
    Unmounted { item_id: ItemId },
    /// A player resource reported a lifecycle change.
    Player {
        item_id: ItemId,
        generation: u64,
        signal: PlayerSignal,
    },
    /// The user's sound preference changed.
    SoundPreferenceChanged { sound_enabled: bool },

    /// The feed was replaced wholesale by the host.
    FeedReloaded {
        items: Vec<FeedItem>,
        #[serde(default)]
        next_cursor: Option<String>,
    },
    /// Items were appended by the host.
    ItemsAppended {
        items: Vec<FeedItem>,
        #[serde(default)]
        next_cursor: Option<String>,
    },
    /// An item was removed (blocked, deleted, or reported away).
    ItemRemoved { item_id: ItemId },
    /// The user pulled to refresh.
    RequestReload,

    /// The user invoked an intent on a specific item.
    Interact {
        intent: Intent,
        item_id: ItemId,
        #[serde(default)]
        display_text: String,
    },
    /// The user invoked an intent on whatever item is active.
    InteractWithActive { intent: Intent },
    /// The open comment/share/report sheet was closed by the user.
    SheetDismissed,
    /// The user confirmed the open report flow.
    SubmitReport { reason: String },
    /// A comment or share collaborator failed.
    InteractionFailed { intent: Intent, message: String },

    /// A collaborator completed a request.
    Worker(WorkerResponse),
}

impl Event {
    /// Short name used in spans and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Viewability(_) => "viewability",
            Self::Tick { .. } => "tick",
            Self::ScrolledAway => "scrolled_away",
            Self::FocusChanged { .. } => "focus_changed",
            Self::Mounted { .. } => "mounted",
            Self::Unmounted { .. } => "unmounted",
            Self::Player { .. } => "player",
            Self::SoundPreferenceChanged { .. } => "sound_preference_changed",
            Self::FeedReloaded { .. } => "feed_reloaded",
            Self::ItemsAppended { .. } => "items_appended",
            Self::ItemRemoved { .. } => "item_removed",
            Self::RequestReload => "request_reload",
            Self::Interact { .. } => "interact",
            Self::InteractWithActive { .. } => "interact_with_active",
            Self::SheetDismissed => "sheet_dismissed",
            Self::SubmitReport { .. } => "submit_report",
            Self::InteractionFailed { .. } => "interaction_failed",
            Self::Worker(_) => "worker",
        }
    }
}

/// Applies one event to the scheduler.
///
/// Returns `(changed, actions)`. `changed` is `true` when the active slot, the
/// saved-set or the open sheet may differ from before.
///
/// # Errors
///
/// Returns [`crate::FeedError::InvariantViolation`] if the step ended with more
/// than one controller playing. All controllers are paused before returning,
/// and the state remains usable for the next event. Actions the failed step
/// had already produced are available from [`FeedState::take_stranded_actions`].
pub fn handle_event(state: &mut FeedState, event: &Event) -> Result<(bool, Vec<Action>)> {
    let _span = tracing::debug_span!("handle_event", event = event.name()).entered();

    match event {
        Event::Viewability(viewability) => {
            let before = state.active_index();
            let actions = state.apply_viewability(viewability)?;
            Ok((state.active_index() != before, actions))
        }
        Event::Tick { timestamp_ms } => {
            let before = state.active_index();
            let actions = state.apply_tick(*timestamp_ms)?;
            Ok((state.active_index() != before, actions))
        }
        Event::ScrolledAway => {
            let before = state.active_index();
            let actions = state.scrolled_away()?;
            Ok((state.active_index() != before, actions))
        }
        Event::FocusChanged { has_focus } => {
            tracing::debug!(has_focus, "focus changed");
            let before = state.active_index();
            let actions = state.apply_focus(*has_focus)?;
            Ok((state.active_index() != before, actions))
        }
        Event::Mounted { item_id } => Ok((false, state.mount(item_id)?)),
        Event::Unmounted { item_id } => {
            let before = state.active_index();
            let actions = state.unmount(item_id)?;
            Ok((state.active_index() != before, actions))
        }
        Event::Player {
            item_id,
            generation,
            signal,
        } => {
            state.player_signal(item_id, *generation, signal)?;
            Ok((false, vec![]))
        }
        Event::SoundPreferenceChanged { sound_enabled } => {
            Ok((state.set_sound_enabled(*sound_enabled), vec![]))
        }
        Event::FeedReloaded { items, next_cursor } => {
            let page = ContentPage {
                items: items.clone(),
                next_cursor: next_cursor.clone(),
            };
            Ok((true, state.replace_feed(page)?))
        }
        Event::ItemsAppended { items, next_cursor } => {
            let page = ContentPage {
                items: items.clone(),
                next_cursor: next_cursor.clone(),
            };
            Ok((true, state.append_feed(page)?))
        }
        Event::ItemRemoved { item_id } => {
            let len = state.source().len();
            let actions = state.remove_item(item_id)?;
            Ok((state.source().len() != len, actions))
        }
        Event::RequestReload => Ok((false, state.request_reload())),
        Event::Interact {
            intent,
            item_id,
            display_text,
        } => {
            let actions = state.interact(*intent, item_id, display_text);
            Ok((!actions.is_empty(), actions))
        }
        Event::InteractWithActive { intent } => {
            let actions = state.interact_with_active(*intent);
            Ok((!actions.is_empty(), actions))
        }
        Event::SheetDismissed => Ok((state.dismiss_sheet(), vec![])),
        Event::SubmitReport { reason } => Ok((false, state.submit_report(reason))),
        Event::InteractionFailed { intent, message } => Ok((false, state.interaction_failed(*intent, message))),
        Event::Worker(response) => {
            let actions = state.apply_worker_response(response)?;
            Ok((true, actions))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{PlayerFactory, PlayerResource, PlayerResult};
    use crate::worker::WorkerMessage;
    use crate::Config;

    struct NullPlayer;

    impl PlayerResource for NullPlayer {
        fn play(&mut self) -> PlayerResult {
            Ok(())
        }
        fn pause(&mut self) -> PlayerResult {
            Ok(())
        }
        fn set_muted(&mut self, _muted: bool) -> PlayerResult {
            Ok(())
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn release(&mut self) {}
    }

    struct NullFactory;

    impl PlayerFactory for NullFactory {
        fn create(&mut self, _item: &FeedItem, _generation: u64) -> Box<dyn PlayerResource> {
            Box::new(NullPlayer)
        }
    }

    fn state_with(ids: &[&str]) -> FeedState {
        let config = Config {
            min_dwell_ms: 0,
            ..Config::default()
        };
        let mut state = FeedState::new(&config, Box::new(NullFactory));
        let items = ids.iter().map(|id| FeedItem::video(*id, format!("{id}.mp4"))).collect();
        handle_event(
            &mut state,
            &Event::FeedReloaded {
                items,
                next_cursor: None,
            },
        )
        .unwrap();
        state
    }

    #[test]
    fn events_parse_from_json_lines() {
        let event: Event = serde_json::from_str(r#"{"focus_changed":{"has_focus":false}}"#).unwrap();
        assert_eq!(event, Event::FocusChanged { has_focus: false });

        let event: Event = serde_json::from_str(r#""scrolled_away""#).unwrap();
        assert_eq!(event, Event::ScrolledAway);

        let event: Event =
            serde_json::from_str(r#"{"interact":{"intent":"share","item_id":"a"}}"#).unwrap();
        assert_eq!(
            event,
            Event::Interact {
                intent: Intent::Share,
                item_id: ItemId::new("a"),
                display_text: String::new(),
            }
        );
    }

    #[test]
    fn viewability_reports_active_change() {
        let mut state = state_with(&["a", "b"]);
        let (changed, actions) = handle_event(
            &mut state,
            &Event::Viewability(ViewabilityEvent::single(0, 1, 0.9)),
        )
        .unwrap();

        assert!(changed);
        assert_eq!(state.active(), Some(1));
        assert!(matches!(actions.first(), Some(Action::ActiveChanged(index)) if index.ordinal == Some(1)));
    }

    #[test]
    fn share_on_active_item_presents_sheet() {
        let mut state = state_with(&["a", "b"]);
        handle_event(
            &mut state,
            &Event::Viewability(ViewabilityEvent::single(0, 0, 1.0)),
        )
        .unwrap();

        let (_, actions) = handle_event(&mut state, &Event::InteractWithActive { intent: Intent::Share }).unwrap();
        match actions.as_slice() {
            [Action::Present { target }] => {
                assert_eq!(target.intent, Intent::Share);
                assert_eq!(target.item_id, ItemId::new("a"));
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn save_posts_to_worker_once_while_in_flight() {
        let mut state = state_with(&["a"]);
        let save = Event::Interact {
            intent: Intent::Save,
            item_id: ItemId::new("a"),
            display_text: String::new(),
        };

        let (_, first) = handle_event(&mut state, &save).unwrap();
        assert!(matches!(
            first.as_slice(),
            [Action::PostToWorker(WorkerMessage::SetSaved { saved: true, .. })]
        ));

        let (_, second) = handle_event(&mut state, &save).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn page_failure_clears_loading_and_notifies() {
        let config = Config::default();
        let mut state = FeedState::new(&config, Box::new(NullFactory));
        let startup = state.startup_actions();
        assert_eq!(startup.len(), 2);
        assert!(state.source().is_loading());

        let (_, actions) = handle_event(
            &mut state,
            &Event::Worker(WorkerResponse::PageFailed {
                message: "offline".to_string(),
            }),
        )
        .unwrap();

        assert!(!state.source().is_loading());
        assert!(matches!(actions.as_slice(), [Action::ShowNotice { .. }]));
    }
}
