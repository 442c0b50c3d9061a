pub mod digitalocean;

pub use digitalocean::DigitalOceanIssuer;
