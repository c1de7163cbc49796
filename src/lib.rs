pub mod absorption;
pub mod builder;
pub mod component;
pub mod config;
pub mod convolution;
pub mod error;
pub mod fit;
pub mod fresnel;
pub mod lorentzian;
pub mod model;
pub mod output;
pub mod params;
pub mod planck;
pub mod quadrature;
pub mod reflectance;
pub mod refr_index;
pub mod sample;
pub mod settings;
pub mod snell;
pub mod special;
pub mod spline;
pub mod urbach;
