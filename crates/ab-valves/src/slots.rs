//! Canonical tank slot names shared by the built-in valves and the brake units.

/// Train line; always the first conduit so it pairs with the neighbours' brake pipe.
pub const BRAKE_PIPE: &str = "brake_pipe";
/// Auxiliary reservoir (pressure chamber on locomotive distributing valves).
pub const AUX_RES: &str = "aux_res";
pub const BRAKE_CYL: &str = "brake_cyl";
pub const EMERGENCY_RES: &str = "emergency_res";
pub const QUICK_ACTION: &str = "quick_action";
pub const QUICK_SERVICE: &str = "quick_service";
pub const APP_CHAMBER: &str = "app_chamber";
/// Mirrors the locomotive's own main reservoir.
pub const MAIN_RES: &str = "main_res";
/// Second train line fed from the main reservoir (main reservoir equalizing pipe).
pub const CONTROL_PIPE: &str = "control_pipe";

/// Slots every valve must declare.
pub const REQUIRED: [&str; 3] = [BRAKE_PIPE, AUX_RES, BRAKE_CYL];
