/// How the text after a slash command is turned into arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArgShape {
    /// The trimmed remainder, kept as one string under `value`.
    Whole,
    /// Shell-style words under `values`.
    Words,
    /// A filesystem path under `path`; quoted or bare words are rejoined.
    Path,
    Bare,
}

pub(crate) struct StudioCommand {
    pub name: &'static str,
    pub action: &'static str,
    pub shape: ArgShape,
}

const fn command(name: &'static str, action: &'static str, shape: ArgShape) -> StudioCommand {
    StudioCommand {
        name,
        action,
        shape,
    }
}

pub(crate) const STUDIO_COMMANDS: &[StudioCommand] = &[
    command("help", "help", ArgShape::Bare),
    command("materials", "list_materials", ArgShape::Bare),
    command("filter", "set_filter", ArgShape::Words),
    command("select", "select_material", ArgShape::Whole),
    command("combo", "set_combination_mode", ArgShape::Whole),
    command("generate", "generate", ArgShape::Bare),
    command("history", "list_history", ArgShape::Bare),
    command("restore", "restore_history", ArgShape::Whole),
    command("reset", "reset", ArgShape::Bare),
    command("compare", "toggle_compare", ArgShape::Bare),
    command("slide", "slide", ArgShape::Words),
    command("save", "save_design", ArgShape::Bare),
    command("export", "export", ArgShape::Path),
    command("status", "status", ArgShape::Bare),
    command("quit", "quit", ArgShape::Bare),
    command("exit", "quit", ArgShape::Bare),
];

pub(crate) fn lookup(name: &str) -> Option<&'static StudioCommand> {
    STUDIO_COMMANDS.iter().find(|entry| entry.name == name)
}

/// Commands advertised by `/help`; `/exit` is an alias and stays unlisted.
pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/help",
    "/materials",
    "/filter",
    "/select",
    "/combo",
    "/generate",
    "/history",
    "/restore",
    "/reset",
    "/compare",
    "/slide",
    "/save",
    "/export",
    "/status",
    "/quit",
];
