//! Remote Participant Registry.
//!
//! Holds the remote tracks this session is subscribed to, keyed by
//! participant. An entry exists iff at least one media kind is subscribed;
//! `has_audio`/`has_video` are derived from the held handles so the two can
//! never disagree.
//!
//! [`PresenceRoster`] is the companion used for join/leave announcements,
//! which also cover members that never publish media.

use std::collections::{BTreeMap, HashMap};

use common::types::{MediaKind, ParticipantId};
use tracing::debug;

use crate::media::RemoteTrack;

/// Read-only view of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub id: ParticipantId,
    pub has_audio: bool,
    pub has_video: bool,
}

#[derive(Default)]
struct Entry {
    audio: Option<Box<dyn RemoteTrack>>,
    video: Option<Box<dyn RemoteTrack>>,
}

impl Entry {
    fn slot(&mut self, kind: MediaKind) -> &mut Option<Box<dyn RemoteTrack>> {
        match kind {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
        }
    }

    fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }

    fn stop_all(&mut self) {
        for track in [self.audio.take(), self.video.take()].into_iter().flatten() {
            track.stop();
        }
    }
}

/// Outcome of [`RemoteParticipantRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First track for this participant.
    Created,
    /// Participant existed; this kind was newly added.
    Updated,
    /// This kind was already held; the old handle was stopped and replaced.
    Replaced,
}

/// Outcome of [`RemoteParticipantRegistry::clear_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// No entry for this participant.
    NotPresent,
    /// Entry exists but did not hold this kind.
    Unchanged,
    /// Kind cleared; the other kind is still held.
    Cleared,
    /// Last kind cleared; entry removed.
    Removed,
}

/// Subscribed remote tracks by participant.
#[derive(Default)]
pub struct RemoteParticipantRegistry {
    entries: HashMap<ParticipantId, Entry>,
}

impl RemoteParticipantRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update `id` with a freshly subscribed `track` of `kind`.
    pub fn upsert(
        &mut self,
        id: &ParticipantId,
        kind: MediaKind,
        track: Box<dyn RemoteTrack>,
    ) -> UpsertOutcome {
        let created = !self.entries.contains_key(id);
        let entry = self.entries.entry(id.clone()).or_default();

        let outcome = match entry.slot(kind).replace(track) {
            Some(superseded) => {
                superseded.stop();
                UpsertOutcome::Replaced
            }
            None if created => UpsertOutcome::Created,
            None => UpsertOutcome::Updated,
        };

        debug!(
            target: "call.registry",
            participant_id = %id,
            kind = %kind,
            outcome = ?outcome,
            "Remote track registered"
        );
        outcome
    }

    /// Stop and drop the `kind` track of `id`. Removes the entry when no
    /// kind remains.
    pub fn clear_kind(&mut self, id: &ParticipantId, kind: MediaKind) -> ClearOutcome {
        let Some(entry) = self.entries.get_mut(id) else {
            return ClearOutcome::NotPresent;
        };

        let Some(track) = entry.slot(kind).take() else {
            return ClearOutcome::Unchanged;
        };
        track.stop();

        if entry.is_empty() {
            self.entries.remove(id);
            debug!(target: "call.registry", participant_id = %id, "Remote participant removed");
            ClearOutcome::Removed
        } else {
            ClearOutcome::Cleared
        }
    }

    /// Remove `id`, stopping every held track. Returns `false` if absent.
    pub fn remove(&mut self, id: &ParticipantId) -> bool {
        match self.entries.remove(id) {
            Some(mut entry) => {
                entry.stop_all();
                true
            }
            None => false,
        }
    }

    /// Stop every held track and empty the registry. Returns the number of
    /// participants removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for (_, mut entry) in self.entries.drain() {
            entry.stop_all();
        }
        count
    }

    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<RemoteParticipant> {
        self.entries.get(id).map(|entry| RemoteParticipant {
            id: id.clone(),
            has_audio: entry.audio.is_some(),
            has_video: entry.video.is_some(),
        })
    }

    #[must_use]
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, ordered by participant ID.
    #[must_use]
    pub fn participants(&self) -> Vec<RemoteParticipant> {
        let mut list: Vec<_> = self.entries.keys().filter_map(|id| self.get(id)).collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

/// Announced presence of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Present,
    Departed,
}

/// Join/leave announcements already made this session.
///
/// A departure is announced once per presence: a messaging `MemberLeft` and
/// a media full-unpublish for the same participant collapse into one.
#[derive(Debug, Default)]
pub struct PresenceRoster {
    members: BTreeMap<ParticipantId, Presence>,
}

impl PresenceRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` present. Returns `true` if a join should be announced.
    pub fn mark_present(&mut self, id: &ParticipantId) -> bool {
        self.members.insert(id.clone(), Presence::Present) != Some(Presence::Present)
    }

    /// Mark `id` departed. Returns `true` if a departure should be announced.
    pub fn mark_departed(&mut self, id: &ParticipantId) -> bool {
        self.members.insert(id.clone(), Presence::Departed) != Some(Presence::Departed)
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::media::RenderTarget;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTrack(Arc<AtomicUsize>);

    impl RemoteTrack for CountingTrack {
        fn play(&self, _target: &RenderTarget) {}

        fn stop(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn track(stops: &Arc<AtomicUsize>) -> Box<dyn RemoteTrack> {
        Box::new(CountingTrack(Arc::clone(stops)))
    }

    fn bob() -> ParticipantId {
        ParticipantId::new("bob")
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut registry = RemoteParticipantRegistry::new();

        assert_eq!(
            registry.upsert(&bob(), MediaKind::Audio, track(&stops)),
            UpsertOutcome::Created
        );
        assert_eq!(
            registry.upsert(&bob(), MediaKind::Video, track(&stops)),
            UpsertOutcome::Updated
        );

        assert_eq!(
            registry.get(&bob()),
            Some(RemoteParticipant {
                id: bob(),
                has_audio: true,
                has_video: true,
            })
        );
        assert_eq!(stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_double_subscribe_is_idempotent() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut registry = RemoteParticipantRegistry::new();

        registry.upsert(&bob(), MediaKind::Video, track(&stops));
        let outcome = registry.upsert(&bob(), MediaKind::Video, track(&stops));

        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(&bob()),
            Some(RemoteParticipant {
                id: bob(),
                has_audio: false,
                has_video: true,
            })
        );
        // Superseded handle stopped.
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_kind_removes_when_last_kind_gone() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut registry = RemoteParticipantRegistry::new();
        registry.upsert(&bob(), MediaKind::Audio, track(&stops));
        registry.upsert(&bob(), MediaKind::Video, track(&stops));

        assert_eq!(
            registry.clear_kind(&bob(), MediaKind::Audio),
            ClearOutcome::Cleared
        );
        assert!(registry.contains(&bob()));
        assert_eq!(
            registry.clear_kind(&bob(), MediaKind::Audio),
            ClearOutcome::Unchanged
        );
        assert_eq!(
            registry.clear_kind(&bob(), MediaKind::Video),
            ClearOutcome::Removed
        );
        assert!(registry.is_empty());
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unpublish_absent_participant_is_noop() {
        let mut registry = RemoteParticipantRegistry::new();

        assert_eq!(
            registry.clear_kind(&ParticipantId::new("ghost"), MediaKind::Video),
            ClearOutcome::NotPresent
        );
        assert!(!registry.remove(&ParticipantId::new("ghost")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_stops_everything() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut registry = RemoteParticipantRegistry::new();
        registry.upsert(&bob(), MediaKind::Audio, track(&stops));
        registry.upsert(&bob(), MediaKind::Video, track(&stops));
        registry.upsert(&ParticipantId::new("carol"), MediaKind::Audio, track(&stops));

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert_eq!(stops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_participants_sorted() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut registry = RemoteParticipantRegistry::new();
        registry.upsert(&ParticipantId::new("zoe"), MediaKind::Audio, track(&stops));
        registry.upsert(&ParticipantId::new("amy"), MediaKind::Video, track(&stops));

        let ids: Vec<_> = registry
            .participants()
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(ids, vec!["amy", "zoe"]);
    }

    #[test]
    fn test_roster_announces_each_transition_once() {
        let mut roster = PresenceRoster::new();

        assert!(roster.mark_present(&bob()));
        assert!(!roster.mark_present(&bob()));
        assert!(roster.mark_departed(&bob()));
        assert!(!roster.mark_departed(&bob()));

        // Rejoin.
        assert!(roster.mark_present(&bob()));
        assert!(!roster.mark_present(&bob()));
    }

    #[test]
    fn test_roster_unknown_departure_is_announced() {
        let mut roster = PresenceRoster::new();

        let early = ParticipantId::new("early-bird");
        assert!(roster.mark_departed(&early));
        assert!(!roster.mark_departed(&early));

        // Cleared between sessions: the next departure is announced again.
        roster.clear();
        assert!(roster.mark_departed(&early));
    }
}
