/// Reduced Planck constant (eV s).
pub const HBAR: f64 = 6.582119569e-16;
/// Speed of light in vacuum (cm/s).
pub const C0: f64 = 2.99792458e10;
/// Boltzmann constant (eV/K).
pub const KB: f64 = 8.617333262e-5;
/// Slab thicknesses are given in nm, absorption coefficients in cm^-1.
pub const NM_TO_CM: f64 = 1e-7;
/// Photon energy (eV) times wavelength (um).
pub const EV_UM: f64 = 1.23984;
/// Largest argument accepted by `exp` before overflow.
pub const MAX_EXP_ARG: f64 = 709.782712893384;
/// Default kernel truncation, in multiples of the tail width.
pub const DEFAULT_WIDTH_FACTOR: f64 = 25.0;
/// Default number of Gauss-Legendre nodes per panel.
pub const DEFAULT_QUAD_ORDER: usize = 48;
/// Default number of panels per integration segment.
pub const DEFAULT_QUAD_PANELS: usize = 2;
/// Above this value of sqrt((E - Eg)/g) the closed form switches to its asymptotic series.
pub const ASYMPTOTIC_EDGE_Y: f64 = 6.0;
