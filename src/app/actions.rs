//! Actions representing side effects for the host to execute.
//!
//! The event handler returns a `Vec<Action>` per event. Player calls are not
//! actions: they happen synchronously inside the step so the single-playing
//! invariant holds at its end. Everything that leaves the process or touches
//! UI outside the feed is an action.

use crate::domain::ItemId;
use crate::scheduler::{ActiveIndex, Intent, InteractionTarget};
use crate::worker::WorkerMessage;
use serde::Serialize;

/// Commands produced by the event handler, executed in order by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The active slot changed. Informational; playback has already been applied.
    ActiveChanged(ActiveIndex),

    /// A controller was created for `item_id`. Player signals for it must
    /// carry this `generation`.
    Mounted { item_id: ItemId, generation: u64 },

    /// Open the comment sheet, share sheet, or report flow against `target`.
    Present { target: InteractionTarget },

    /// Close the sheet for `intent` opened against `item_id`.
    CloseSheet { intent: Intent, item_id: ItemId },

    /// Show an error inside the open sheet or modal.
    SurfaceError {
        intent: Intent,
        item_id: ItemId,
        message: String,
    },

    /// Show a dismissible notice outside any sheet.
    ShowNotice { message: String },

    /// Hand a request to the collaborator worker.
    PostToWorker(WorkerMessage),

    /// Deliver an [`crate::Event::Tick`] at this time so a pending dwell can confirm.
    ScheduleTick { at_ms: u64 },
}
