//! Script replay against a live balancer.
//!
//! Executes commands in arrival order, printing every response (the ones
//! returned by `forward` and the ones emitted while queues flush) through a
//! stdout sink, and tallies run totals for the final summary.

use std::num::NonZeroUsize;

use docstore_rs::config::BalancerConfig;
use docstore_rs::protocol::{Request, Response, ResponseSink, ServerLog, StdoutSink};
use docstore_rs::LoadBalancer;

use crate::input::{ScriptError, ScriptReader};
use crate::models::{Command, RunConfig, RunSummary};

/// Sink that discards responses, for `--quiet` runs.
#[derive(Debug, Default, Clone, Copy)]
struct NullSink;

impl ResponseSink for NullSink {
    fn emit(&mut self, _response: &Response) {}
}

/// Replays a script against one balancer.
#[derive(Debug)]
pub struct ScriptRunner {
    config: RunConfig,
    balancer: LoadBalancer,
    summary: RunSummary,
}

impl ScriptRunner {
    pub fn new(config: RunConfig) -> Self {
        let balancer_config = if config.enable_vnodes {
            BalancerConfig::with_vnodes()
        } else {
            BalancerConfig::default()
        };
        Self {
            config,
            balancer: LoadBalancer::init(balancer_config),
            summary: RunSummary::default(),
        }
    }

    /// Streams the script and executes every command.
    pub fn run(&mut self) -> Result<(), ScriptError> {
        let reader = ScriptReader::new(&self.config.script);
        for command in reader.stream_commands()? {
            self.execute(command?);
        }
        Ok(())
    }

    /// Executes a single command.
    pub fn execute(&mut self, command: Command) {
        let mut stdout = StdoutSink;
        let mut null = NullSink;
        let sink: &mut dyn ResponseSink = if self.config.quiet {
            &mut null
        } else {
            &mut stdout
        };

        self.summary.commands += 1;
        match command {
            Command::AddServer { id, cache_capacity } => {
                let capacity = NonZeroUsize::new(cache_capacity)
                    .expect("parser rejects zero cache capacities");
                self.balancer.add_server(id, capacity, sink);
                self.summary.joins += 1;
            }
            Command::RemoveServer { id } => {
                self.balancer.remove_server(id, sink);
                self.summary.leaves += 1;
            }
            Command::Request(request) => {
                let is_get = matches!(request, Request::Get { .. });
                if is_get {
                    self.summary.gets += 1;
                } else {
                    self.summary.edits += 1;
                }
                match self.balancer.forward(request, sink) {
                    Some(response) => {
                        if response.log == ServerLog::Fault {
                            self.summary.faults += 1;
                        }
                        sink.emit(&response);
                    }
                    None => {
                        log::warn!("request dropped: no server in the ring");
                        self.summary.unroutable += 1;
                    }
                }
            }
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }
}
