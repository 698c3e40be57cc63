// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Declarative per-field update rules.
//!
//! An entity's healthy-state update is a static table of [`FieldRule`]s.
//! Each rule computes a baseline from the state as updated so far, applies
//! its noise, clamps to `[floor, ceiling]`, and stores the result. Rules
//! run in table order, so later fields may depend on earlier ones (clock
//! speed reads the freshly computed temperature).

use rand::Rng;

use super::UpdateError;

/// Noise applied on top of a rule's baseline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Noise {
    None,
    /// `baseline + U(lo, hi)`
    Uniform(f64, f64),
    /// `baseline + U{lo..=hi}`
    Integer(i64, i64),
    /// `baseline * U(lo, hi)`
    Scale(f64, f64),
}

impl Noise {
    pub fn apply<R: Rng + ?Sized>(&self, baseline: f64, rng: &mut R) -> f64 {
        match *self {
            Noise::None => baseline,
            Noise::Uniform(lo, hi) => baseline + draw(rng, lo, hi),
            Noise::Integer(lo, hi) => {
                let step = if lo < hi { rng.random_range(lo..=hi) } else { lo };
                baseline + step as f64
            }
            Noise::Scale(lo, hi) => baseline * draw(rng, lo, hi),
        }
    }
}

/// Uniform real draw that tolerates an empty range.
pub fn draw<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if lo < hi {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}

/// One field of an entity's update policy.
pub struct FieldRule<S> {
    pub field: &'static str,
    pub formula: fn(&S) -> f64,
    pub noise: Noise,
    pub floor: f64,
    pub ceiling: f64,
    pub store: fn(&mut S, f64),
}

impl<S> FieldRule<S> {
    /// Evaluate the rule without storing the result.
    pub fn evaluate<R: Rng + ?Sized>(&self, state: &S, rng: &mut R) -> Result<f64, UpdateError> {
        let value = self.noise.apply((self.formula)(state), rng);
        if !value.is_finite() {
            return Err(UpdateError::NonFinite {
                field: self.field,
                value,
            });
        }
        Ok(value.clamp(self.floor, self.ceiling))
    }
}

/// Run every rule of `table` against `state` in order.
///
/// On error `state` may be partially updated; callers evaluate on a copy
/// and keep the previous state when this fails.
pub fn apply_rules<S, R: Rng + ?Sized>(
    table: &[FieldRule<S>],
    state: &mut S,
    rng: &mut R,
) -> Result<(), UpdateError> {
    for rule in table {
        let value = rule.evaluate(state, rng)?;
        (rule.store)(state, value);
    }
    Ok(())
}
