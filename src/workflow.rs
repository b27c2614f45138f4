//! Kanban status workflow.
//!
//! Moving a card is split in two: [`Board::move_application`] is a pure local
//! transform applied optimistically, and [`commit_status_change`] makes it
//! durable. [`BoardSession`] composes them and re-reads the board from the
//! store when a commit fails instead of trying to undo locally.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Application, ApplicationPatch, ApplicationStatus, TimelineEvent};
use crate::store::{load_applications, ApplicationStore};

/// Applications grouped into one column per status, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    columns: BTreeMap<ApplicationStatus, Vec<Application>>,
    unrecognized: Vec<Application>,
}

/// A drag-and-drop gesture: take `id` out of `from` and drop it at `to_index` in `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub id: String,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub to_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// Nothing moved and no event was recorded.
    Unchanged,
    /// Same column, new position. Status and timeline untouched.
    Reordered,
    StatusChanged {
        id: String,
        from: ApplicationStatus,
        to: ApplicationStatus,
        event: TimelineEvent,
    },
}

pub fn partition_by_status(applications: impl IntoIterator<Item = Application>) -> Board {
    let mut board = Board::empty();
    for app in applications {
        board.bucket_mut(app.status).push(app);
    }
    board
}

impl Board {
    pub fn empty() -> Self {
        let columns = ApplicationStatus::ALL
            .iter()
            .map(|status| (*status, Vec::new()))
            .collect();
        Self {
            columns,
            unrecognized: Vec::new(),
        }
    }

    pub fn column(&self, status: ApplicationStatus) -> &[Application] {
        match status {
            ApplicationStatus::Unrecognized => &self.unrecognized,
            _ => self.columns.get(&status).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (ApplicationStatus, &[Application])> + '_ {
        self.columns.iter().map(|(status, apps)| (*status, apps.as_slice()))
    }

    /// Records whose stored status matched no known column.
    pub fn unrecognized(&self) -> &[Application] {
        &self.unrecognized
    }

    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum::<usize>() + self.unrecognized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self, id: &str) -> Option<(ApplicationStatus, usize)> {
        self.columns
            .iter()
            .map(|(status, apps)| (*status, apps.as_slice()))
            .chain(std::iter::once((ApplicationStatus::Unrecognized, self.unrecognized.as_slice())))
            .find_map(|(status, apps)| apps.iter().position(|a| a.id == id).map(|i| (status, i)))
    }

    pub fn get(&self, id: &str) -> Option<&Application> {
        self.position(id).and_then(|(status, index)| self.column(status).get(index))
    }

    /// Applies a drag locally.
    ///
    /// A status change sets the new status and appends exactly one
    /// `status_change` event (`note` or "Status changed to: {to}"). Dropping a
    /// card back where it was, naming an id that is not in `from`, or targeting
    /// `Unrecognized` leaves the board untouched.
    pub fn move_application(
        &mut self,
        request: &MoveRequest,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> MoveOutcome {
        if request.to == ApplicationStatus::Unrecognized {
            return MoveOutcome::Unchanged;
        }

        let source = self.bucket_mut(request.from);
        let Some(index) = source.iter().position(|a| a.id == request.id) else {
            debug!(id = %request.id, from = %request.from, "move ignored, card not in source column");
            return MoveOutcome::Unchanged;
        };

        if request.from == request.to {
            let target = request.to_index.min(source.len() - 1);
            if target == index {
                return MoveOutcome::Unchanged;
            }
            let app = source.remove(index);
            source.insert(target, app);
            return MoveOutcome::Reordered;
        }

        let mut app = source.remove(index);
        let event = TimelineEvent::status_change(request.to, note, at);
        app.status = request.to;
        app.timeline.push(event.clone());
        app.updated_at = at;

        let destination = self.bucket_mut(request.to);
        let target = request.to_index.min(destination.len());
        destination.insert(target, app);

        MoveOutcome::StatusChanged {
            id: request.id.clone(),
            from: request.from,
            to: request.to,
            event,
        }
    }

    fn bucket_mut(&mut self, status: ApplicationStatus) -> &mut Vec<Application> {
        match status {
            ApplicationStatus::Unrecognized => &mut self.unrecognized,
            _ => self.columns.entry(status).or_default(),
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

/// Persists a status change with a freshly built `status_change` event.
pub fn commit_status_change<S: ApplicationStore + ?Sized>(
    store: &S,
    id: &str,
    to: ApplicationStatus,
    note: Option<&str>,
) -> Result<TimelineEvent, StoreError> {
    let event = TimelineEvent::status_change(to, note, Utc::now());
    persist_status_change(store, id, to, &event)?;
    Ok(event)
}

/// Persists a status change together with an already-built event, so the
/// stored timeline matches what was shown optimistically.
pub fn persist_status_change<S: ApplicationStore + ?Sized>(
    store: &S,
    id: &str,
    to: ApplicationStatus,
    event: &TimelineEvent,
) -> Result<(), StoreError> {
    if to == ApplicationStatus::Unrecognized {
        return Err(StoreError::Invalid("cannot set an unrecognized status".to_string()));
    }
    store.patch_application(id, &ApplicationPatch::status_change(to, event.clone()))
}

/// A board bound to one owner and the store it was read from.
///
/// `drag` borrows the session mutably, so at most one commit is in flight.
pub struct BoardSession<S> {
    store: S,
    owner_id: String,
    board: Board,
}

impl<S: ApplicationStore> BoardSession<S> {
    pub fn open(store: S, owner_id: &str) -> Result<Self, StoreError> {
        let board = partition_by_status(load_applications(&store, owner_id)?);
        Ok(Self {
            store,
            owner_id: owner_id.to_string(),
            board,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Replaces local state with the store's canonical records.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.board = partition_by_status(load_applications(&self.store, &self.owner_id)?);
        Ok(())
    }

    /// Moves a card optimistically and commits status changes.
    ///
    /// If the record vanished from the store the board is re-read and the
    /// move reported as `Unchanged`. Any other commit failure is returned after
    /// the board has been re-read (or, if that fails too, restored).
    pub fn drag(&mut self, request: &MoveRequest, note: Option<&str>) -> Result<MoveOutcome, StoreError> {
        let snapshot = self.board.clone();
        let outcome = self.board.move_application(request, note, Utc::now());

        let MoveOutcome::StatusChanged { id, from, to, event } = &outcome else {
            return Ok(outcome);
        };

        match persist_status_change(&self.store, id, *to, event) {
            Ok(()) => {
                info!(id = %id, from = %from, to = %to, "status committed");
                Ok(outcome)
            }
            Err(StoreError::NotFound(missing)) => {
                warn!(id = %missing, "application disappeared before commit, reloading board");
                self.reload_or_restore(snapshot);
                Ok(MoveOutcome::Unchanged)
            }
            Err(err) => {
                warn!(id = %id, to = %to, error = %err, "status commit failed, reloading board");
                self.reload_or_restore(snapshot);
                Err(err)
            }
        }
    }

    fn reload_or_restore(&mut self, snapshot: Board) {
        if let Err(err) = self.refresh() {
            warn!(error = %err, "reload failed, restoring board as it was before the move");
            self.board = snapshot;
        }
    }
}
