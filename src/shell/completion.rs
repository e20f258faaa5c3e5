use rustyline::Context;
use rustyline::completion::{Completer, Pair};
use std::sync::{Arc, PoisonError, RwLock};

use crate::cache::ListingCache;
use crate::resource::ResourceManager;
use crate::vfs::{UserId, VirtualPath};

/// Entry offered for completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Commands that only take directories
const DIR_COMMANDS: &[&str] = &["cd", "mkdir", "zip"];

/// Shared view of the drive used by the completer
#[derive(Clone)]
pub struct CompletionCache {
    manager: Arc<ResourceManager>,
    user: UserId,
    listings: ListingCache,
    commands: Vec<String>,
    cwd: Arc<RwLock<VirtualPath>>,
}

impl CompletionCache {
    pub fn new(manager: Arc<ResourceManager>, user: UserId, listings: ListingCache) -> Self {
        CompletionCache {
            manager,
            user,
            listings,
            commands: [
                "ls", "cd", "pwd", "stat", "cat", "mkdir", "put", "get", "zip", "mv", "rm",
                "find", "help", "exit",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            cwd: Arc::new(RwLock::new(VirtualPath::root())),
        }
    }

    pub fn set_cwd(&self, path: VirtualPath) {
        *self.cwd.write().unwrap_or_else(PoisonError::into_inner) = path;
    }

    pub fn cwd(&self) -> VirtualPath {
        self.cwd
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Entries of `dir`, from the listing cache or fetched on a miss
    pub fn entries(&self, dir: &VirtualPath) -> Vec<CompletionEntry> {
        let key = dir.as_dir();
        let listing = match self.listings.get(&key) {
            Some(listing) => listing,
            None => match self.fetch(&key) {
                Some(entries) => self.listings.put(key, entries),
                None => return Vec::new(),
            },
        };

        listing
            .iter()
            .map(|res| CompletionEntry {
                name: res.name.clone(),
                is_dir: res.is_dir(),
            })
            .collect()
    }

    /// Block on a listing from inside rustyline's synchronous callback
    fn fetch(&self, dir: &str) -> Option<Vec<crate::vfs::Resource>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let manager = Arc::clone(&self.manager);
        let user = self.user;
        let dir = dir.to_string();

        let (tx, rx) = std::sync::mpsc::channel();
        handle.spawn(async move {
            let result = manager.list(user, &dir, false).await;
            let _ = tx.send(result);
        });

        rx.recv().ok()?.ok()
    }
}

/// Tab completion helper for the shell
pub struct ShellCompleter {
    cache: CompletionCache,
}

impl ShellCompleter {
    pub fn new(cache: CompletionCache) -> Self {
        ShellCompleter { cache }
    }

    /// Complete a command at the start of the line
    fn complete_command(&self, word: &str) -> Vec<Pair> {
        self.cache
            .commands()
            .iter()
            .filter(|cmd| cmd.starts_with(word))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect()
    }

    /// Complete the path argument `word` for `command`
    fn complete_path(&self, word: &str, command: &str) -> Vec<Pair> {
        let (dir_part, prefix) = match word.rfind('/') {
            Some(i) => (&word[..=i], &word[i + 1..]),
            None => ("", word),
        };
        let dir = self.cache.cwd().join(dir_part);
        let dirs_only = DIR_COMMANDS.contains(&command);

        self.cache
            .entries(&dir)
            .into_iter()
            .filter(|entry| entry.name.starts_with(prefix))
            .filter(|entry| !dirs_only || entry.is_dir)
            .map(|entry| {
                let suffix = if entry.is_dir { "/" } else { "" };
                Pair {
                    display: format!("{}{suffix}", entry.name),
                    replacement: format!("{dir_part}{}{suffix}", entry.name),
                }
            })
            .collect()
    }
}

impl Completer for ShellCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if line.trim().is_empty() {
            return Ok((0, Vec::new()));
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let at_new_word = line.ends_with(char::is_whitespace);

        // First word: commands
        if words.len() == 1 && !at_new_word {
            let start = line.len() - words[0].len();
            return Ok((start, self.complete_command(words[0])));
        }

        let command = words[0];
        let word = if at_new_word {
            ""
        } else {
            words.last().copied().unwrap_or("")
        };
        // `put` takes a local file first
        if command == "put" && (words.len() == 1 || (words.len() == 2 && !at_new_word)) {
            return Ok((pos, Vec::new()));
        }

        Ok((pos - word.len(), self.complete_path(word, command)))
    }
}

impl rustyline::Helper for ShellCompleter {}
impl rustyline::highlight::Highlighter for ShellCompleter {}
impl rustyline::hint::Hinter for ShellCompleter {
    type Hint = String;
}
impl rustyline::validate::Validator for ShellCompleter {}
