/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use lockstep_participant::ParticipantId;
use lockstep_steps::step::{CombinedStep, Step, StepOctets};
use lockstep_steps::StepId;
use std::fmt::{Display, Formatter};
use std::io;
use tick_id::TickId;

pub fn step_id_to_stream(step_id: StepId, stream: &mut impl WriteOctetStream) -> io::Result<()> {
    stream.write_u32(step_id.0)
}

pub fn step_id_from_stream(stream: &mut impl ReadOctetStream) -> io::Result<StepId> {
    Ok(TickId(stream.read_u32()?))
}

/// Writes one combined step: participant count followed by (id, step) pairs in
/// the map's deterministic order.
pub fn combined_step_to_stream(
    combined_step: &CombinedStep,
    stream: &mut impl WriteOctetStream,
) -> io::Result<()> {
    stream.write_u8(combined_step.len() as u8)?;
    for (participant_id, step) in combined_step {
        participant_id.serialize(stream)?;
        step.serialize(stream)?;
    }
    Ok(())
}

pub fn combined_step_from_stream(stream: &mut impl ReadOctetStream) -> io::Result<CombinedStep> {
    let participant_count = stream.read_u8()?;
    let mut combined_step = CombinedStep::new();
    for _ in 0..participant_count {
        let participant_id = ParticipantId::deserialize(stream)?;
        let step = Step::deserialize(stream)?;
        combined_step
            .insert(participant_id, step)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    }
    Ok(combined_step)
}

/// Predicted steps for the participants one connection controls.
///
/// A run is one participant's consecutive payloads; `delta_step_id` lets a run
/// start later than `start_step_id` when the client has already had earlier
/// steps acknowledged.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PredictedStepRun {
    pub participant_id: ParticipantId,
    pub delta_step_id: u8,
    pub payloads: Vec<StepOctets>,
}

impl PredictedStepRun {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.participant_id.serialize(stream)?;
        stream.write_u8(self.delta_step_id)?;
        stream.write_u8(self.payloads.len() as u8)?;
        for payload in &self.payloads {
            payload.serialize(stream)?;
        }
        Ok(())
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let participant_id = ParticipantId::deserialize(stream)?;
        let delta_step_id = stream.read_u8()?;
        let payload_count = stream.read_u8()? as usize;
        let mut payloads = Vec::with_capacity(payload_count);
        for _ in 0..payload_count {
            payloads.push(StepOctets::deserialize(stream)?);
        }
        Ok(Self {
            participant_id,
            delta_step_id,
            payloads,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PredictedStepRuns {
    pub start_step_id: StepId,
    pub runs: Vec<PredictedStepRun>,
}

impl Display for PredictedStepRuns {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} run_count:{}", self.start_step_id, self.runs.len())
    }
}

impl Serialize for PredictedStepRuns {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        step_id_to_stream(self.start_step_id, stream)?;
        stream.write_u8(self.runs.len() as u8)?;
        for run in &self.runs {
            run.to_stream(stream)?;
        }
        Ok(())
    }
}

impl Deserialize for PredictedStepRuns {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let start_step_id = step_id_from_stream(stream)?;
        let run_count = stream.read_u8()? as usize;
        let mut runs = Vec::with_capacity(run_count);
        for _ in 0..run_count {
            runs.push(PredictedStepRun::from_stream(stream)?);
        }
        Ok(Self {
            start_step_id,
            runs,
        })
    }
}
