pub mod ban_control;
