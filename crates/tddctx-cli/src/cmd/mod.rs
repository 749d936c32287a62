pub mod check;
pub mod gate;
pub mod record;
pub mod update;
