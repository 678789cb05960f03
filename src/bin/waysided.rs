// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Thin demo binary: binds one address, serves one document root, and runs
//! a reactor per core. Parsing a real config file or a full CLI is out of
//! scope here — this just wires [`wayside::worker::Worker`] up to
//! `std::env::args` so the crate is runnable without embedding it in
//! something else first.

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use wayside::config::Config;
use wayside::offload;
use wayside::worker::Worker;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let listen_addr = args.next().unwrap_or_else(|| "127.0.0.1:8080".to_string());
    let www = args.next().unwrap_or_else(|| "www".to_string());

    let mut config = Config::default();
    config.fs.www = www;
    match listen_addr.parse() {
        Ok(addr) => config.listen.push(addr),
        Err(e) => {
            eprintln!("invalid listen address {listen_addr:?}: {e}");
            return ExitCode::FAILURE;
        }
    }
    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }
    let config = Arc::new(config);

    let (offload_handle, _offload_threads) =
        offload::spawn_workers(config.offload_workers, config.polling_mode);

    let reactor_count = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    log::info!(
        "wayside listening on {:?}, serving {:?} from {reactor_count} reactor thread(s)",
        config.listen,
        config.fs.www,
    );

    let mut handles = Vec::with_capacity(reactor_count);
    for i in 0..reactor_count {
        let config = config.clone();
        let offload_handle = offload_handle.clone();
        handles.push(thread::spawn(move || {
            let mut worker = match Worker::new(config, offload_handle) {
                Ok(w) => w,
                Err(e) => {
                    log::error!("reactor {i} failed to start: {e}");
                    return;
                }
            };
            if let Err(e) = worker.run() {
                log::error!("reactor {i} stopped: {e}");
            }
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }
    ExitCode::SUCCESS
}
