//! Script parsing for the replay tool.
//!
//! Scripts are plain text, one command per line:
//!
//! ```text
//! # comments and blank lines are skipped
//! add_server <id> <cache_capacity>
//! remove_server <id>
//! edit <name> <content to end of line>
//! get <name>
//! ```
//!
//! A path may be a single file or a directory, in which case every
//! `.txt`/`.log`/`.script` file is replayed in name order. Commands stream
//! one at a time; memory stays proportional to a line, not the script.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use docstore_rs::protocol::Request;
use thiserror::Error;

use crate::models::Command;

/// Errors produced while reading a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("script parse error: {0}")]
    Parse(String),
}

/// Reader resolving a path to the script files it covers.
#[derive(Debug)]
pub struct ScriptReader {
    path: PathBuf,
}

impl ScriptReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Script files covered by the path, sorted by name.
    pub fn script_files(&self) -> io::Result<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext == "txt" || ext == "log" || ext == "script" {
                        files.push(path);
                    }
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Streams commands across all covered files.
    pub fn stream_commands(&self) -> Result<CommandIterator, ScriptError> {
        Ok(CommandIterator::new(self.script_files()?))
    }
}

/// Splits the first whitespace-delimited word off a trimmed line.
fn split_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// Parses one line; `Ok(None)` for blanks and comments.
pub fn parse_line(line: &str, line_num: usize) -> Result<Option<Command>, ScriptError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (op, rest) = split_word(line);
    let command = match op.to_ascii_lowercase().as_str() {
        "add_server" => {
            let (id, rest) = split_word(rest);
            let (capacity, _) = split_word(rest);
            let id = id.parse::<u32>().map_err(|_| {
                ScriptError::Parse(format!("line {}: invalid server id {id:?}", line_num + 1))
            })?;
            let cache_capacity = capacity.parse::<usize>().map_err(|_| {
                ScriptError::Parse(format!(
                    "line {}: invalid cache capacity {capacity:?}",
                    line_num + 1
                ))
            })?;
            if cache_capacity == 0 {
                return Err(ScriptError::Parse(format!(
                    "line {}: cache capacity must be positive",
                    line_num + 1
                )));
            }
            Command::AddServer { id, cache_capacity }
        }
        "remove_server" => {
            let (id, _) = split_word(rest);
            let id = id.parse::<u32>().map_err(|_| {
                ScriptError::Parse(format!("line {}: invalid server id {id:?}", line_num + 1))
            })?;
            Command::RemoveServer { id }
        }
        "edit" => {
            let (name, content) = split_word(rest);
            if name.is_empty() {
                return Err(ScriptError::Parse(format!(
                    "line {}: edit needs a document name",
                    line_num + 1
                )));
            }
            Command::Request(Request::Edit {
                name: name.to_owned(),
                content: content.to_owned(),
            })
        }
        "get" => {
            let (name, _) = split_word(rest);
            if name.is_empty() {
                return Err(ScriptError::Parse(format!(
                    "line {}: get needs a document name",
                    line_num + 1
                )));
            }
            Command::Request(Request::Get {
                name: name.to_owned(),
            })
        }
        other => {
            return Err(ScriptError::Parse(format!(
                "line {}: unknown command {other:?}",
                line_num + 1
            )))
        }
    };
    Ok(Some(command))
}

/// Iterator that streams commands from a sequence of script files.
#[derive(Debug)]
pub struct CommandIterator {
    files: Vec<PathBuf>,
    current_file_index: usize,
    current_reader: Option<BufReader<File>>,
    current_line_num: usize,
    line_buffer: String,
}

impl CommandIterator {
    fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            current_file_index: 0,
            current_reader: None,
            current_line_num: 0,
            line_buffer: String::with_capacity(256),
        }
    }

    fn open_next_file(&mut self) -> io::Result<bool> {
        if self.current_file_index >= self.files.len() {
            return Ok(false);
        }
        let file = File::open(&self.files[self.current_file_index])?;
        self.current_reader = Some(BufReader::with_capacity(64 * 1024, file));
        self.current_line_num = 0;
        self.current_file_index += 1;
        Ok(true)
    }
}

impl Iterator for CommandIterator {
    type Item = Result<Command, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_reader.is_none() {
                match self.open_next_file() {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(e) => return Some(Err(ScriptError::Io(e))),
                }
            }

            if let Some(reader) = &mut self.current_reader {
                self.line_buffer.clear();
                match reader.read_line(&mut self.line_buffer) {
                    Ok(0) => {
                        self.current_reader = None;
                        continue;
                    }
                    Ok(_) => {
                        let line_num = self.current_line_num;
                        self.current_line_num += 1;
                        match parse_line(&self.line_buffer, line_num) {
                            Ok(Some(command)) => return Some(Ok(command)),
                            Ok(None) => continue,
                            Err(e) => return Some(Err(e)),
                        }
                    }
                    Err(e) => return Some(Err(ScriptError::Io(e))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_topology_commands() {
        assert_eq!(
            parse_line("add_server 3 100", 0).unwrap(),
            Some(Command::AddServer {
                id: 3,
                cache_capacity: 100
            })
        );
        assert_eq!(
            parse_line("remove_server 3", 0).unwrap(),
            Some(Command::RemoveServer { id: 3 })
        );
    }

    #[test]
    fn test_parse_edit_keeps_content_spaces() {
        let command = parse_line("edit index.html <html>hello world</html>", 0)
            .unwrap()
            .unwrap();
        assert_eq!(
            command,
            Command::Request(Request::Edit {
                name: "index.html".into(),
                content: "<html>hello world</html>".into(),
            })
        );
    }

    #[test]
    fn test_parse_get() {
        let command = parse_line("get index.html", 4).unwrap().unwrap();
        assert_eq!(
            command,
            Command::Request(Request::Get {
                name: "index.html".into()
            })
        );
    }

    #[test]
    fn test_skips_blanks_and_comments() {
        assert_eq!(parse_line("", 0).unwrap(), None);
        assert_eq!(parse_line("   ", 0).unwrap(), None);
        assert_eq!(parse_line("# add_server 1 10", 0).unwrap(), None);
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!(parse_line("add_server one 10", 0).is_err());
        assert!(parse_line("add_server 1 0", 0).is_err());
        assert!(parse_line("get", 0).is_err());
        assert!(parse_line("frobnicate 1", 0).is_err());
    }

    #[test]
    fn test_stream_commands_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "add_server 1 10").unwrap();
        writeln!(file, "# warm up").unwrap();
        writeln!(file, "edit a hello").unwrap();
        writeln!(file, "get a").unwrap();
        drop(file);

        let commands: Vec<Command> = ScriptReader::new(&path)
            .stream_commands()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], Command::AddServer { id: 1, .. }));
    }

    #[test]
    fn test_directory_replay_is_name_ordered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "get late\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "get early\n").unwrap();
        std::fs::write(dir.path().join("ignored.csv"), "get never\n").unwrap();

        let commands: Vec<Command> = ScriptReader::new(dir.path())
            .stream_commands()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            commands,
            vec![
                Command::Request(Request::Get {
                    name: "early".into()
                }),
                Command::Request(Request::Get {
                    name: "late".into()
                }),
            ]
        );
    }
}
