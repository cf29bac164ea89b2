//! Sun light distribution over the grid.

use evotree_core::params::{DECORATOR_BY_TIME, DECORATOR_BY_X};
use evotree_core::{Error, Result, WorldParams};

/// A modifier added on top of the base light.
#[derive(Debug, Clone, PartialEq)]
pub enum LightDecorator {
    /// Triangle wave over time: every `delay` turns the shift moves by
    /// `step`, reversing at `min` and `max`.
    ByTime {
        max: i32,
        min: i32,
        delay: i32,
        step: i32,
        shift: i32,
        rising: bool,
        elapsed: i32,
    },
    /// Fixed per-column shift, one full sine period across the grid.
    ByX { shifts: Vec<i32> },
}

impl LightDecorator {
    fn by_time(params: &WorldParams) -> Result<Self> {
        let param = |name: &str| params.int_param(&format!("{}.{}", DECORATOR_BY_TIME, name));
        let max = param("max")?;
        let min = param("min")?;
        let delay = param("delay")?;
        let step = param("step")?;
        if delay <= 0 {
            return Err(Error::Config(format!("{}.delay must be positive, got {}", DECORATOR_BY_TIME, delay)));
        }
        if min > max {
            return Err(Error::Config(format!("{}: min {} exceeds max {}", DECORATOR_BY_TIME, min, max)));
        }
        Ok(LightDecorator::ByTime {
            max,
            min,
            delay,
            step,
            shift: 0.clamp(min, max),
            rising: true,
            elapsed: 0,
        })
    }

    fn by_x(params: &WorldParams) -> Result<Self> {
        let half_magnitude = params.int_param(&format!("{}.halfMagnitude", DECORATOR_BY_X))?;
        if params.width <= 0 {
            return Err(Error::Config(format!("{} needs a positive grid width, got {}", DECORATOR_BY_X, params.width)));
        }
        let width = params.width as f64;
        let shifts = (0..params.width)
            .map(|x| {
                let angle = std::f64::consts::TAU * (x as f64 + 0.5) / width;
                (angle.sin() * half_magnitude as f64).round() as i32
            })
            .collect();
        Ok(LightDecorator::ByX { shifts })
    }

    fn shift(&self, x: i32) -> i32 {
        match self {
            LightDecorator::ByTime { shift, .. } => *shift,
            LightDecorator::ByX { shifts } => {
                shifts[x.rem_euclid(shifts.len() as i32) as usize]
            }
        }
    }

    fn next_turn(&mut self) {
        if let LightDecorator::ByTime {
            max,
            min,
            delay,
            step,
            shift,
            rising,
            elapsed,
        } = self
        {
            *elapsed += 1;
            if *elapsed < *delay {
                return;
            }
            *elapsed = 0;
            if *rising {
                *shift += *step;
                if *shift >= *max {
                    *shift = *max;
                    *rising = false;
                }
            } else {
                *shift -= *step;
                if *shift <= *min {
                    *shift = *min;
                    *rising = true;
                }
            }
        }
    }
}

/// Light at every cell before propagation, plus the per-hop decay.
#[derive(Debug, Clone)]
pub struct LightDistribution {
    height: i32,
    sun_light: i32,
    absorption_step: i32,
    decay: f32,
    turn: u32,
    decorators: Vec<LightDecorator>,
}

impl LightDistribution {
    /// Builds the base distribution and its decorators in configured order.
    pub fn from_params(params: &WorldParams) -> Result<Self> {
        let decorators = params
            .decorators
            .iter()
            .map(|name| match name.as_str() {
                DECORATOR_BY_TIME => LightDecorator::by_time(params),
                DECORATOR_BY_X => LightDecorator::by_x(params),
                other => Err(Error::UnknownDecorator(other.to_string())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            height: params.height,
            sun_light: params.sun_light,
            absorption_step: params.light_absorption_step,
            decay: params.light_decay,
            turn: 0,
            decorators,
        })
    }

    pub fn light(&self, x: i32, y: i32) -> i32 {
        let base = self.sun_light - (self.height - 1 - y) * self.absorption_step;
        self.decorators
            .iter()
            .fold(base, |light, decorator| light + decorator.shift(x))
    }

    /// Fraction of light that survives one propagation hop.
    pub fn light_absorption(&self) -> f32 {
        self.decay
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn next_turn(&mut self) -> u32 {
        self.turn += 1;
        for decorator in &mut self.decorators {
            decorator.next_turn();
        }
        self.turn
    }

    pub fn decorators(&self) -> &[LightDecorator] {
        &self.decorators
    }
}
