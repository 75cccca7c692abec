use crate::loader::CommandModule;

pub mod general;
pub mod help;

/// Every compiled-in module, in load order
pub fn builtin() -> Vec<Box<dyn CommandModule>> {
    vec![Box::new(general::GeneralModule), Box::new(help::HelpModule)]
}

/// Embed colors shared by the built-in commands
pub(crate) const COLOR_BLUE: u32 = 0x3498DB;
pub(crate) const COLOR_PURPLE: u32 = 0x9B59B6;
pub(crate) const COLOR_GOLD: u32 = 0xF1C40F;

/// Discord rejects embeds with more fields than this.
pub(crate) const EMBED_FIELD_LIMIT: usize = 25;
