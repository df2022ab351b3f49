//! Text templates for everything the bot sends.

use log::error;
use minijinja::Environment;
use minijinja::Value;

const TEMPLATES: &[(&str, &str)] = &[
    (
        "seat_available",
        "Good news! Class {{ code }} ({{ title }}) now has {{ seats }} seat(s) available.",
    ),
    (
        "start",
        "Hello! I'm the class seat bot. I can help you track class availability.\n\n\
         Use /add CRN to add a class to track\n\
         Use /remove CRN to stop tracking a class\n\
         Use /list to see all classes you're tracking\n\
         Use /check CRN to check a class availability now",
    ),
    (
        "help",
        "Available commands:\n\
         /start - Start the bot\n\
         /help - Show this help message\n\
         /add CRN - Add a class to track\n\
         /remove CRN - Stop tracking a class\n\
         /list - List all tracked classes\n\
         /check CRN - Check class availability now",
    ),
    ("adding", "Checking class and adding to list..."),
    ("checking", "Checking..."),
    ("empty_code", "Error: CRN cannot be empty"),
    (
        "added",
        "Added CRN {{ code }} ({{ title }}) to your tracking list.",
    ),
    (
        "already_tracking",
        "CRN {{ code }} ({{ title }}) is already in your tracking list.",
    ),
    (
        "probe_failed",
        "Error checking class for CRN {{ code }}:\n\n{{ error }}\n\nPlease verify the CRN is correct and try again.",
    ),
    (
        "check_failed",
        "Error checking class availability for CRN {{ code }}:\n\n{{ error }}\n\nPlease try again later.",
    ),
    ("removed", "Removed CRN {{ code }} from your tracking list."),
    ("not_tracking", "CRN {{ code }} is not in your tracking list."),
    ("list_empty", "You are not tracking any classes."),
    (
        "list",
        "You are tracking the following classes:\n\
         {% for s in subscriptions %}- {{ s.code }} ({{ s.title }})\n{% endfor %}",
    ),
    (
        "check",
        "Class CRN {{ code }}:\nTitle: {{ title }}\nSeats Available: {{ seats }}",
    ),
    (
        "unknown",
        "Unknown command. Type /help for available commands.",
    ),
    ("echo", "You said: {{ text }}"),
    ("error", "Something went wrong: {{ error }}"),
];

/// Renders the named message templates.
pub struct Messages {
    env: Environment<'static>,
}

impl Messages {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            if let Err(e) = env.add_template(name, source) {
                error!("Failed to load message template `{name}`: {e}");
            }
        }
        Self { env }
    }

    pub fn render(&self, name: &str, ctx: Value) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }
}
