//! Synthetic workload generation.
//!
//! Produces replayable scripts: a fleet of servers, then a seeded random mix
//! of edits and reads over a document population, with optional topology
//! churn sprinkled through the run. Document popularity is skewed so the
//! cache tier has something to do: a small hot set takes most of the
//! traffic and a long tail takes the rest.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters for one generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Servers added up front, ids `1..=servers`.
    pub servers: u32,
    /// Unique documents in the population.
    pub documents: u32,
    /// Total requests to emit.
    pub requests: u32,
    /// Percentage of requests that are edits.
    pub edit_percent: u8,
    /// Percentage of requests followed by a topology change.
    pub churn_percent: u8,
    /// Cache capacity handed to every `add_server`.
    pub cache_capacity: usize,
    /// RNG seed; equal seeds produce identical scripts.
    pub seed: u64,
    /// Output script path.
    pub output: PathBuf,
}

/// Writes scripts from a [`WorkloadConfig`].
#[derive(Debug)]
pub struct WorkloadGenerator {
    config: WorkloadConfig,
}

impl WorkloadGenerator {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    /// Generates the script file.
    pub fn generate(&self) -> io::Result<()> {
        let file = File::create(&self.config.output)?;
        let mut out = BufWriter::new(file);
        self.write_script(&mut out)?;
        out.flush()
    }

    fn write_script<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let config = &self.config;
        let mut rng = StdRng::seed_from_u64(config.seed);

        writeln!(out, "# generated workload: seed={}", config.seed)?;
        let mut active: Vec<u32> = (1..=config.servers.max(1)).collect();
        let mut parked: Vec<u32> = Vec::new();
        for id in &active {
            writeln!(out, "add_server {id} {}", config.cache_capacity)?;
        }

        // 20% of documents take 80% of the traffic.
        let documents = config.documents.max(1);
        let hot_set = (documents / 5).max(1);

        for _ in 0..config.requests {
            let doc = if rng.gen_bool(0.8) {
                rng.gen_range(0..hot_set)
            } else {
                rng.gen_range(0..documents)
            };
            if rng.gen_range(0..100) < config.edit_percent {
                writeln!(out, "edit doc-{doc} content-{}", rng.gen_range(0..u32::MAX))?;
            } else {
                writeln!(out, "get doc-{doc}")?;
            }

            if config.churn_percent > 0 && rng.gen_range(0..100) < config.churn_percent {
                self.write_churn(out, &mut rng, &mut active, &mut parked)?;
            }
        }
        Ok(())
    }

    /// Re-adds a parked server or removes an active one, keeping at least
    /// one server in the ring.
    fn write_churn<W: Write>(
        &self,
        out: &mut W,
        rng: &mut StdRng,
        active: &mut Vec<u32>,
        parked: &mut Vec<u32>,
    ) -> io::Result<()> {
        let rejoin = !parked.is_empty() && (active.len() <= 1 || rng.gen_bool(0.5));
        if rejoin {
            let id = parked.swap_remove(rng.gen_range(0..parked.len()));
            writeln!(out, "add_server {id} {}", self.config.cache_capacity)?;
            active.push(id);
        } else if active.len() > 1 {
            let id = active.swap_remove(rng.gen_range(0..active.len()));
            writeln!(out, "remove_server {id}")?;
            parked.push(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptReader;
    use crate::models::Command;

    fn config(dir: &std::path::Path, requests: u32, churn: u8, seed: u64) -> WorkloadConfig {
        WorkloadConfig {
            servers: 3,
            documents: 50,
            requests,
            edit_percent: 60,
            churn_percent: churn,
            cache_capacity: 8,
            seed,
            output: dir.join("workload.txt"),
        }
    }

    fn parsed_commands(config: &WorkloadConfig) -> Vec<Command> {
        WorkloadGenerator::new(config.clone()).generate().unwrap();
        ScriptReader::new(&config.output)
            .stream_commands()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_generated_script_parses_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let commands = parsed_commands(&config(dir.path(), 200, 5, 7));
        // 3 initial joins plus one command per request plus churn lines.
        assert!(commands.len() >= 203);
        assert!(matches!(commands[0], Command::AddServer { .. }));
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let dir = tempfile::tempdir().unwrap();
        let first = parsed_commands(&config(dir.path(), 100, 10, 42));
        let second = parsed_commands(&config(dir.path(), 100, 10, 42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_churn_never_empties_the_ring() {
        let dir = tempfile::tempdir().unwrap();
        let commands = parsed_commands(&config(dir.path(), 500, 30, 3));
        let mut active = 0i32;
        for command in commands {
            match command {
                Command::AddServer { .. } => active += 1,
                Command::RemoveServer { .. } => active -= 1,
                Command::Request(_) => assert!(active >= 1),
            }
        }
    }
}
