/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::err::ServerError;
use freelist_rs::FreeList;
use lockstep_participant::{ParticipantId, ParticipantMap};
use lockstep_steps::step::CombinedStep;
use lockstep_steps::{StepId, StepRing};
use log::debug;
use tick_id::TickId;

/// How many authoritative steps a joiner can reasonably be asked to replay.
/// When the snapshot lags the write head by more than this, the host
/// application should push a fresh one.
pub const REASONABLE_CATCHUP_STEPS: usize = 80;

/// Hard cap on the serialized game state.
pub const MAX_GAME_STATE_OCTET_COUNT: usize = 64 * 1024;

/// The canonical starting point handed to joining clients: the serialized
/// game state and the step id it is valid at.
#[derive(Debug, Clone)]
pub struct GameStateSnapshot {
    pub step_id: StepId,
    pub octets: Vec<u8>,
}

/// One controlled entity in the game. Owned by the [`Game`]; connections refer
/// to participants by id only.
#[derive(Debug)]
pub struct Participant {
    pub id: ParticipantId,
    pub local_index: u8,
    /// Participant connection currently providing this participant's steps.
    /// `None` after a disconnect, until the client rejoins.
    pub connection_id: Option<u8>,
    pub(crate) needs_join_announcement: bool,
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (local index {})", self.id, self.local_index)
    }
}

/// The authoritative side of one running game: the combined-step ring every
/// client replays, the latest snapshot for joiners, and the participant table.
pub struct Game {
    pub authoritative_steps: StepRing<CombinedStep>,
    pub debug_frozen: bool,
    latest_snapshot: Option<GameStateSnapshot>,
    participants: ParticipantMap<Participant>,
    participant_ids: FreeList<u8>,
    max_participant_count: usize,
    max_game_state_octet_count: usize,
}

impl Game {
    #[must_use]
    pub fn new(max_participant_count: usize, max_game_state_octet_count: usize) -> Self {
        Self {
            authoritative_steps: StepRing::new(TickId(0)),
            debug_frozen: false,
            latest_snapshot: None,
            participants: ParticipantMap::new(),
            participant_ids: FreeList::new(0xff),
            max_participant_count,
            max_game_state_octet_count,
        }
    }

    /// Replaces the stored snapshot. The snapshot is the authoritative
    /// zero-point for any client that joins from now on.
    pub fn set_game_state(&mut self, step_id: StepId, octets: &[u8]) -> Result<(), ServerError> {
        if octets.len() > self.max_game_state_octet_count {
            return Err(ServerError::GameStateOctetCountTooLarge {
                requested: octets.len(),
                maximum: self.max_game_state_octet_count,
            });
        }
        debug!(
            "game state set for {} ({} octets)",
            step_id,
            octets.len()
        );
        self.latest_snapshot = Some(GameStateSnapshot {
            step_id,
            octets: octets.to_vec(),
        });
        Ok(())
    }

    /// True when the stored snapshot has fallen so far behind the write head
    /// that joiners would have to replay an excessive step history.
    #[must_use]
    pub fn must_provide_game_state(&self) -> bool {
        match &self.latest_snapshot {
            None => true,
            Some(snapshot) => {
                let delta = i64::from(self.authoritative_steps.expected_write_id().0)
                    - i64::from(snapshot.step_id.0);
                delta > REASONABLE_CATCHUP_STEPS as i64
            }
        }
    }

    #[must_use]
    pub fn latest_snapshot(&self) -> Option<&GameStateSnapshot> {
        self.latest_snapshot.as_ref()
    }

    #[must_use]
    pub fn participants(&self) -> &ParticipantMap<Participant> {
        &self.participants
    }

    pub(crate) fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    /// Restarts the game from a snapshot: the authoritative ring begins at the
    /// snapshot's step id and the participant table is empty.
    pub fn re_init(&mut self, step_id: StepId, octets: &[u8]) -> Result<(), ServerError> {
        self.authoritative_steps.re_init(step_id);
        self.participants = ParticipantMap::new();
        self.participant_ids = FreeList::new(0xff);
        self.debug_frozen = false;
        self.latest_snapshot = None;
        self.set_game_state(step_id, octets)
    }

    /// Allocates the smallest unused participant ids for the given local
    /// players and records them as owned by `connection_id`.
    pub(crate) fn create_participants(
        &mut self,
        local_indices: &[u8],
        connection_id: u8,
    ) -> Result<Vec<(u8, ParticipantId)>, ServerError> {
        if self.participants.len() + local_indices.len() > self.max_participant_count {
            return Err(ServerError::NoFreeParticipantSlots);
        }
        let mut created = Vec::with_capacity(local_indices.len());
        for local_index in local_indices {
            // Participant ids are confined to [1, 0xFF]; zero is reserved.
            let id = self
                .participant_ids
                .allocate()
                .map(|value| ParticipantId(value + 1))
                .ok_or(ServerError::NoFreeParticipantSlots)?;
            self.participants
                .insert(
                    id,
                    Participant {
                        id,
                        local_index: *local_index,
                        connection_id: Some(connection_id),
                        needs_join_announcement: true,
                    },
                )
                .map_err(|_| ServerError::ParticipantIdCollision(id))?;
            created.push((*local_index, id));
        }
        Ok(created)
    }

    /// Detaches all participants owned by `connection_id`. The participants
    /// stay in the game for its lifetime; they just stop receiving input.
    pub(crate) fn detach_participants_for_connection(&mut self, connection_id: u8) {
        let ids: Vec<ParticipantId> = self.participants.keys().copied().collect();
        for id in ids {
            if let Some(participant) = self.participants.get_mut(&id) {
                if participant.connection_id == Some(connection_id) {
                    participant.connection_id = None;
                }
            }
        }
    }
}
