//! Crane configuration table
//!
//! Static geometry and mass data for each outreach radius, with the moment of
//! inertia about the front tipping edge derived once at construction.

use serde::Serialize;

use crate::CraneError;

/// Standard gravity used by the reference table [m/s^2]
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Moment of inertia about the tipping edge for a point mass at the center of
/// gravity (no inertia about the mass's own center).
pub fn tipping_inertia(mass_total: f64, x_cog: f64, z_cog: f64, width: f64) -> f64 {
    let a0 = width / 2.0 - x_cog;
    let h0 = z_cog;
    mass_total * (a0 * a0 + h0 * h0)
}

/// One load/geometry configuration of the crane
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CraneConfiguration {
    /// Horizontal center of gravity, measured from the crane center [m]
    x_cog: f64,
    /// Vertical center of gravity [m]
    z_cog: f64,
    /// Base width between support edges [m]
    width: f64,
    /// Structure plus load mass [kg]
    mass_total: f64,
    /// Gravitational acceleration [m/s^2]
    g: f64,
    /// Outreach radius this row describes [m]
    radius: f64,
    /// Moment of inertia about the tipping edge [kg m^2]
    inertia: f64,
}

impl CraneConfiguration {
    /// Create a configuration, deriving the tipping-edge inertia
    pub fn new(
        x_cog: f64,
        z_cog: f64,
        width: f64,
        mass_total: f64,
        g: f64,
        radius: f64,
    ) -> Result<Self, CraneError> {
        for (name, value) in [
            ("x_cog", x_cog),
            ("z_cog", z_cog),
            ("radius", radius),
        ] {
            if !value.is_finite() {
                return Err(CraneError::invalid(name, value));
            }
        }
        if !(width.is_finite() && width > 0.0) {
            return Err(CraneError::invalid("width", width));
        }
        if !(mass_total.is_finite() && mass_total > 0.0) {
            return Err(CraneError::invalid("mass_total", mass_total));
        }
        if !(g.is_finite() && g > 0.0) {
            return Err(CraneError::invalid("g", g));
        }

        let inertia = tipping_inertia(mass_total, x_cog, z_cog, width);
        if !(inertia.is_finite() && inertia > 0.0) {
            return Err(CraneError::invalid("IT", inertia));
        }

        Ok(Self {
            x_cog,
            z_cog,
            width,
            mass_total,
            g,
            radius,
            inertia,
        })
    }

    pub fn x_cog(&self) -> f64 {
        self.x_cog
    }

    pub fn z_cog(&self) -> f64 {
        self.z_cog
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn mass_total(&self) -> f64 {
        self.mass_total
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Moment of inertia about the tipping edge `IT`
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Signed horizontal offset from the tipping edge to the center of gravity
    pub fn edge_offset(&self) -> f64 {
        self.width / 2.0 - self.x_cog
    }

    /// Distance from the tipping edge to the center of gravity
    pub fn pivot_radius(&self) -> f64 {
        self.edge_offset().hypot(self.z_cog)
    }

    /// Rotation angle of the center of gravity about the edge at rest [rad]
    pub fn initial_angle(&self) -> f64 {
        self.z_cog.atan2(self.edge_offset())
    }
}

/// Ordered, immutable table of configurations indexed by `i`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CraneTable {
    rows: Vec<CraneConfiguration>,
}

impl CraneTable {
    pub fn new(rows: Vec<CraneConfiguration>) -> Result<Self, CraneError> {
        if rows.is_empty() {
            return Err(CraneError::InvalidConfig(
                "crane table must contain at least one configuration".to_string(),
            ));
        }
        Ok(Self { rows })
    }

    /// Reference load chart: radius 10..20 m on a 10 m base, 500 t of
    /// structure plus the rated load at each radius.
    pub fn reference() -> Self {
        const X_COG: [f64; 11] = [3.0, 3.1, 3.2, 3.3, 3.4, 3.5, 3.6, 3.7, 3.8, 3.9, 4.0];
        const Z_COG: [f64; 11] = [
            30.0, 28.8, 27.6, 26.5, 25.4, 24.4, 23.5, 22.6, 21.8, 21.0, 20.3,
        ];
        const LOAD_T: [f64; 11] = [
            250.0, 225.0, 200.0, 180.0, 165.0, 150.0, 135.0, 122.0, 110.0, 99.0, 89.0,
        ];
        const STRUCTURE_T: f64 = 750.0 - 250.0;
        const WIDTH: f64 = 10.0;

        let rows = (0..X_COG.len())
            .map(|i| {
                let mass_total = 1000.0 * STRUCTURE_T + 1000.0 * LOAD_T[i];
                let x_cog = X_COG[i];
                let z_cog = Z_COG[i];
                CraneConfiguration {
                    x_cog,
                    z_cog,
                    width: WIDTH,
                    mass_total,
                    g: STANDARD_GRAVITY,
                    radius: 10.0 + i as f64,
                    inertia: tipping_inertia(mass_total, x_cog, z_cog, WIDTH),
                }
            })
            .collect();

        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&CraneConfiguration, CraneError> {
        self.rows.get(index).ok_or(CraneError::UnknownConfiguration {
            index,
            len: self.rows.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &CraneConfiguration)> {
        self.rows.iter().enumerate()
    }
}

impl Default for CraneTable {
    fn default() -> Self {
        Self::reference()
    }
}
