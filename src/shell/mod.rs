pub mod commands;
pub mod completion;

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::ListingCache;
use crate::resource::ResourceManager;
use crate::vfs::{Resource, UserId, VirtualPath};
use commands::Command;
pub use completion::{CompletionCache, ShellCompleter};

/// Shell state - the signed-in user, the working directory and the commands
pub struct ShellState {
    manager: Arc<ResourceManager>,
    user: UserId,
    /// Current directory inside the user's drive
    cwd: VirtualPath,
    /// Print results as JSON instead of text
    json: bool,
    listings: ListingCache,
    completion_cache: CompletionCache,
    commands: HashMap<String, Arc<dyn Command>>,
}

impl ShellState {
    /// Create a shell for `user` with every built-in command registered
    pub fn new(manager: Arc<ResourceManager>, user: UserId) -> Self {
        let listings = ListingCache::new(100);
        let completion_cache = CompletionCache::new(Arc::clone(&manager), user, listings.clone());

        let mut state = ShellState {
            manager,
            user,
            cwd: VirtualPath::root(),
            json: false,
            listings,
            completion_cache,
            commands: HashMap::new(),
        };

        state.register_command(Arc::new(commands::ls::LsCommand));
        state.register_command(Arc::new(commands::cd::CdCommand));
        state.register_command(Arc::new(commands::cat::CatCommand));
        state.register_command(Arc::new(commands::stat::StatCommand));
        state.register_command(Arc::new(commands::mkdir::MkdirCommand));
        state.register_command(Arc::new(commands::put::PutCommand));
        state.register_command(Arc::new(commands::get::GetCommand));
        state.register_command(Arc::new(commands::zip::ZipCommand));
        state.register_command(Arc::new(commands::mv::MvCommand));
        state.register_command(Arc::new(commands::rm::RmCommand));
        state.register_command(Arc::new(commands::find::FindCommand));

        state
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn register_command(&mut self, command: Arc<dyn Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    /// Execute a command line
    pub async fn execute(&mut self, line: &str) -> Result<()> {
        let parts = Self::parse_command_line(line.trim())?;
        let Some((cmd_name, args)) = parts.split_first() else {
            return Ok(());
        };

        // Built-ins first
        match cmd_name.as_str() {
            "exit" | "quit" => {
                return Err(anyhow!("exit"));
            }
            "help" => {
                self.print_help();
                return Ok(());
            }
            "pwd" => {
                println!("{}", self.cwd);
                return Ok(());
            }
            _ => {}
        }

        if let Some(command) = self.commands.get(cmd_name) {
            let cmd = Arc::clone(command);
            cmd.execute(self, args).await
        } else {
            Err(anyhow!("Unknown command: {cmd_name}"))
        }
    }

    pub fn manager(&self) -> &ResourceManager {
        &self.manager
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn json(&self) -> bool {
        self.json
    }

    /// Current directory
    pub fn cwd(&self) -> &VirtualPath {
        &self.cwd
    }

    pub fn set_cwd(&mut self, path: VirtualPath) {
        self.completion_cache.set_cwd(path.clone());
        self.cwd = path;
    }

    /// Resolve a command argument against the current directory
    pub fn resolve(&self, arg: &str) -> VirtualPath {
        self.cwd.join(arg)
    }

    pub fn completion_cache(&self) -> &CompletionCache {
        &self.completion_cache
    }

    /// List a directory, going through the listing cache
    pub async fn list_dir(&self, dir: &VirtualPath) -> Result<Arc<Vec<Resource>>> {
        let key = dir.as_dir();
        if let Some(entries) = self.listings.get(&key) {
            return Ok(entries);
        }
        let entries = self.manager.list(self.user, &key, false).await?;
        Ok(self.listings.put(key, entries))
    }

    /// Drop cached listings affected by a change at `path`
    pub fn invalidate(&self, path: &VirtualPath) {
        let parent = path.parent().unwrap_or_else(VirtualPath::root);
        self.listings.invalidate(&parent.as_dir());
    }

    pub fn invalidate_all(&self) {
        self.listings.clear();
    }

    fn print_help(&self) {
        println!("Available commands:");
        for name in [
            "ls", "cd", "stat", "cat", "mkdir", "put", "get", "zip", "mv", "rm", "find",
        ] {
            if let Some(command) = self.commands.get(name) {
                println!("  {}", command.usage());
            }
        }
        println!("  pwd              - Print working directory");
        println!("  help             - Show this help");
        println!("  exit/quit        - Exit the shell");
    }

    pub fn prompt(&self) -> String {
        format!("s3drive:{} $ ", self.cwd)
    }

    /// Split a command line into words, honouring quotes and backslashes
    fn parse_command_line(line: &str) -> Result<Vec<String>> {
        let mut args = Vec::new();
        let mut current_arg = String::new();
        let mut in_word = false;
        let mut in_single_quote = false;
        let mut in_double_quote = false;
        let mut escape_next = false;

        for ch in line.chars() {
            if escape_next {
                current_arg.push(ch);
                escape_next = false;
                continue;
            }

            match ch {
                '\\' if !in_single_quote => {
                    escape_next = true;
                    in_word = true;
                }
                '\'' if !in_double_quote => {
                    in_single_quote = !in_single_quote;
                    in_word = true;
                }
                '"' if !in_single_quote => {
                    in_double_quote = !in_double_quote;
                    in_word = true;
                }
                ' ' | '\t' if !in_single_quote && !in_double_quote => {
                    if in_word {
                        args.push(std::mem::take(&mut current_arg));
                        in_word = false;
                    }
                }
                _ => {
                    current_arg.push(ch);
                    in_word = true;
                }
            }
        }

        if in_single_quote {
            return Err(anyhow!("Unclosed single quote"));
        }
        if in_double_quote {
            return Err(anyhow!("Unclosed double quote"));
        }
        if in_word {
            args.push(current_arg);
        }

        Ok(args)
    }
}
