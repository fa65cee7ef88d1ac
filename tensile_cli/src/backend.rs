//! Rig assembly: real GPIO with the `hardware` feature, otherwise a
//! simulated specimen that stretches elastically and snaps.

use std::sync::Arc;

use tensile_core::rig::DynClock;
use tensile_core::{Rig, RigConfig, RigLines};
use tensile_traits::MonotonicClock;

pub fn build_rig(cfg: &tensile_config::Config) -> eyre::Result<Rig> {
    let rig_cfg = RigConfig::from(cfg);
    let clock: DynClock = Arc::new(MonotonicClock::new());
    let lines = make_lines(cfg)?;
    Rig::new(lines, clock, &rig_cfg)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn make_lines(cfg: &tensile_config::Config) -> eyre::Result<RigLines> {
    use eyre::WrapErr;
    use tensile_hardware::gpio::{open_gpio, open_input, open_output};

    let pins = &cfg.pins;
    let gpio = open_gpio().wrap_err("open gpio")?;
    let hx711_dt = open_input(&gpio, pins.hx711_dt).wrap_err("open hx711 pins")?;
    let hx711_sck = open_output(&gpio, pins.hx711_sck).wrap_err("open hx711 pins")?;
    let motor_step = open_output(&gpio, pins.motor_step).wrap_err("open motor pins")?;
    let motor_dir = open_output(&gpio, pins.motor_dir).wrap_err("open motor pins")?;
    let motor_en = pins
        .motor_en
        .map(|pin| open_output(&gpio, pin))
        .transpose()
        .wrap_err("open motor pins")?;
    tracing::info!(
        dt = pins.hx711_dt,
        sck = pins.hx711_sck,
        step = pins.motor_step,
        dir = pins.motor_dir,
        en = ?pins.motor_en,
        "gpio lines opened"
    );
    Ok(RigLines {
        hx711_dt: Box::new(hx711_dt),
        hx711_sck: Box::new(hx711_sck),
        motor_step: Box::new(motor_step),
        motor_dir: Box::new(motor_dir),
        motor_en: motor_en.map(|en| Box::new(en) as tensile_core::rig::BoxedOutput),
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn make_lines(cfg: &tensile_config::Config) -> eyre::Result<RigLines> {
    let specimen = sim::Specimen::from_env();
    tracing::info!(
        stiffness_n_per_mm = specimen.stiffness_n_per_mm,
        break_at_mm = specimen.break_at_mm,
        "simulated backend"
    );
    Ok(sim::lines(cfg, specimen))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
mod sim {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    use tensile_core::RigLines;
    use tensile_hardware::sim::{SimHx711, SimLine};
    use tensile_traits::OutputLine;

    /// Raw counts the simulated amplifier reports with no load.
    const UNLOADED_COUNTS: f64 = 8_000.0;

    /// Linear-elastic specimen that breaks at a fixed elongation.
    #[derive(Debug, Clone, Copy)]
    pub struct Specimen {
        pub stiffness_n_per_mm: f64,
        pub break_at_mm: f64,
    }

    impl Specimen {
        /// Defaults, overridable through `TENSILE_SIM_STIFFNESS` (N/mm) and
        /// `TENSILE_SIM_BREAK_MM`.
        pub fn from_env() -> Self {
            let read = |key: &str, default: f64| {
                std::env::var(key)
                    .ok()
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .unwrap_or(default)
            };
            Self {
                stiffness_n_per_mm: read("TENSILE_SIM_STIFFNESS", 20.0),
                break_at_mm: read("TENSILE_SIM_BREAK_MM", 50.0),
            }
        }

        pub fn force_at(&self, elongation_mm: f64) -> f64 {
            if elongation_mm <= 0.0 || elongation_mm >= self.break_at_mm {
                0.0
            } else {
                self.stiffness_n_per_mm * elongation_mm
            }
        }
    }

    /// Step line that counts signed steps using the direction line level.
    struct CarriageStep {
        step: SimLine,
        dir: SimLine,
        steps: Arc<AtomicI64>,
    }

    impl OutputLine for CarriageStep {
        fn set_high(&mut self) {
            let before = self.step.rising_edges();
            self.step.set_high();
            if self.step.rising_edges() != before {
                let delta = if self.dir.level() { 1 } else { -1 };
                self.steps.fetch_add(delta, Ordering::AcqRel);
            }
        }

        fn set_low(&mut self) {
            self.step.set_low();
        }
    }

    pub fn lines(cfg: &tensile_config::Config, specimen: Specimen) -> RigLines {
        let steps = Arc::new(AtomicI64::new(0));
        let mm_per_step = cfg.motor.travel_per_rev_mm / f64::from(cfg.motor.steps_per_rev.max(1));
        let raw_to_force = cfg.sensor.raw_to_force;

        let source_steps = steps.clone();
        let hx = SimHx711::new().with_source(move || {
            let elongation = source_steps.load(Ordering::Acquire) as f64 * mm_per_step;
            let counts = UNLOADED_COUNTS + specimen.force_at(elongation) / raw_to_force;
            Some(counts.round() as i32)
        });
        let (dt, sck) = hx.lines();

        let dir = SimLine::new();
        RigLines {
            hx711_dt: Box::new(dt),
            hx711_sck: Box::new(sck),
            motor_step: Box::new(CarriageStep {
                step: SimLine::new(),
                dir: dir.clone(),
                steps,
            }),
            motor_dir: Box::new(dir),
            motor_en: Some(Box::new(SimLine::new())),
        }
    }

}
