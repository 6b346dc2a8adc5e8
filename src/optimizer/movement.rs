//! Shifting chunks.
//!
//! Both directions follow the same shape: estimate a benefit from the
//! chunk's interfaces, bound the shift by the slack the interfaces leave,
//! apply the shift, rebuild the touched trees and keep the result only if
//! every tree is realizable and the relay total strictly dropped.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use super::chunk::Chunk;
use super::{ChunkOptimizer, Snapshot};
use crate::network::LogicNetwork;
use crate::schedule::splitter_levels;
use crate::types::NodeId;

/// Slack before any interface constrains it.
const UNBOUNDED: i64 = i64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Down,
    Up,
}

fn shifted(level: u32, shift: i64) -> u32 {
    (level as i64 + shift).clamp(0, u32::MAX as i64) as u32
}

impl<'a, N: LogicNetwork> ChunkOptimizer<'a, N> {
    /// Try to move `chunk` to earlier levels.
    ///
    /// Each input interface is pseudo-moved to the lowest free spot of its
    /// outside producer's tree; the distance bounds the shift. Removing the
    /// last consumer of a tree's deepest layer counts as a gain, every
    /// distinct member feeding outside consumers counts as a loss.
    pub(super) fn analyze_down(&mut self, chunk: &Chunk) -> bool {
        let snapshot = Snapshot::capture(self.schedule, self.counter, chunk);
        let mut benefit: i64 = 0;
        let mut slack = UNBOUNDED;

        let mut marked = BTreeSet::new();
        for oi in &chunk.output_interfaces {
            if marked.insert(oi.inner) {
                benefit -= 1;
            }
        }

        for ii in &chunk.input_interfaces {
            let rd = self
                .schedule
                .level(ii.inner)
                .saturating_sub(self.schedule.level(ii.outer));
            let lowest = self.counter.lowest_spot(self.ntk, ii.outer);
            if rd <= lowest {
                slack = 0;
                break;
            }
            slack = slack.min((rd - lowest) as i64);
            self.counter.pseudo_move(ii.outer, ii.inner, rd, lowest);
            if let Some(back) = self.counter.tree(ii.outer).back() {
                if back.relative_depth == rd && back.edges == 0 {
                    benefit += 1;
                }
            }
        }

        // gates stay at level 1 or above, inputs at 0 or above
        for &m in &chunk.members {
            let floor = if self.ntk.is_input(m) { 0 } else { 1 };
            slack = slack.min(self.schedule.level(m) as i64 - floor);
        }

        let period = self.config.phase_period as i64;
        let move_outputs =
            !self.config.balance_outputs && !chunk.po_interfaces.is_empty() && slack >= period;
        if !move_outputs {
            for poi in &chunk.po_interfaces {
                if !marked.contains(&poi.inner) {
                    benefit -= 1;
                }
            }
        }
        let slack = self.settle_slack(chunk, slack, Direction::Down, move_outputs);

        if benefit <= 0 || slack <= 0 {
            snapshot.restore(self.schedule, self.counter);
            return false;
        }

        let outputs: Vec<usize> = if move_outputs {
            chunk.po_interfaces.iter().map(|poi| poi.output).collect()
        } else {
            Vec::new()
        };
        self.apply_shift(chunk, -slack, &outputs, snapshot)
    }

    /// Try to move `chunk` to later levels.
    ///
    /// Distinct members feeding outside consumers gain, members that are the
    /// deepest consumer of an outside producer lose. Outputs either cap the
    /// shift (balanced outputs) or move along, bounded by the depth.
    pub(super) fn analyze_up(&mut self, chunk: &Chunk) -> bool {
        let mut benefit: i64 = 0;
        let mut slack = UNBOUNDED;

        for ii in &chunk.input_interfaces {
            let rd = self
                .schedule
                .level(ii.inner)
                .saturating_sub(self.schedule.level(ii.outer));
            let deepest = self.counter.tree(ii.outer).back().map(|b| b.relative_depth);
            if deepest == Some(rd) {
                benefit -= 1;
            }
        }

        let mut marked = BTreeSet::new();
        for oi in &chunk.output_interfaces {
            if marked.insert(oi.inner) {
                benefit += 1;
            }
            let tree = self.counter.tree(oi.inner);
            let bound = match tree.front() {
                Some(front) if tree.len() == 1 => front.relative_depth as i64 - 1,
                _ => self.schedule.level(oi.outer) as i64 - self.schedule.level(oi.inner) as i64 - 2,
            };
            slack = slack.min(bound);
        }

        let mut outputs = Vec::new();
        for poi in &chunk.po_interfaces {
            let po = self.schedule.po_level(poi.output) as i64;
            let reach = self.schedule.level(poi.inner) as i64
                + splitter_levels(self.ntk, self.config, poi.inner) as i64;
            if reach.saturating_add(slack) >= po {
                if self.config.balance_outputs {
                    slack = slack.min(po - reach - 1);
                } else {
                    slack = slack.min(self.schedule.depth as i64 + 1 - po);
                    outputs.push(poi.output);
                }
            } else if !marked.contains(&poi.inner) {
                benefit += 1;
            }
        }

        if benefit <= 0 || slack <= 0 || slack == UNBOUNDED {
            return false;
        }
        let slack = self.settle_slack(chunk, slack, Direction::Up, !outputs.is_empty());
        if slack <= 0 {
            return false;
        }

        let snapshot = Snapshot::capture(self.schedule, self.counter, chunk);
        self.apply_shift(chunk, slack, &outputs, snapshot)
    }

    /// Largest shift not above `slack` that puts every input member on an
    /// acceptable level and, when outputs move, keeps them period aligned.
    fn settle_slack(&self, chunk: &Chunk, slack: i64, direction: Direction, aligned: bool) -> i64 {
        let period = self.config.phase_period as i64;
        let inputs: Vec<NodeId> = chunk
            .members
            .iter()
            .copied()
            .filter(|&m| self.ntk.is_input(m))
            .collect();

        let mut slack = slack;
        while slack > 0 {
            let inputs_ok = inputs.iter().all(|&m| {
                let level = self.schedule.level(m) as i64;
                let target = match direction {
                    Direction::Down => level - slack,
                    Direction::Up => level + slack,
                };
                u32::try_from(target).map_or(false, |t| self.config.is_acceptable_input_level(t))
            });
            if inputs_ok && (!aligned || slack % period == 0) {
                break;
            }
            slack -= 1;
        }
        slack
    }

    /// Shift members (and `outputs`) by `shift`, then keep or roll back.
    fn apply_shift(&mut self, chunk: &Chunk, shift: i64, outputs: &[usize], snapshot: Snapshot) -> bool {
        let before = self.counter.running_total();

        for &m in &chunk.members {
            let level = shifted(self.schedule.level(m), shift);
            self.schedule.set_level(m, level);
        }
        for &output in outputs {
            self.schedule.po_levels[output] = shifted(self.schedule.po_levels[output], shift);
        }

        let touched = chunk
            .members
            .iter()
            .copied()
            .chain(chunk.input_interfaces.iter().map(|ii| ii.outer));
        let mut legal = true;
        for n in touched {
            if let Err(violation) = self.counter.rebuild_node(self.ntk, self.schedule, n) {
                trace!(chunk = chunk.id, %violation, "Shift is not realizable");
                legal = false;
                break;
            }
        }

        let after = self.counter.running_total();
        if !legal || after >= before {
            snapshot.restore(self.schedule, self.counter);
            self.report.moves_rejected += 1;
            trace!(chunk = chunk.id, shift, before, after, "Shift rolled back");
            return false;
        }

        self.start_id = self.chunk_counter;
        self.report.moves_committed += 1;
        debug!(
            chunk = chunk.id,
            members = chunk.members.len(),
            shift,
            before,
            after,
            "Chunk moved"
        );
        true
    }
}
