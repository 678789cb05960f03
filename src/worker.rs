//! Ties the reactor, connection table, timer wheel, and offload pool
//! together into one event loop. Each `Worker` owns its own `Poll` and can
//! run on its own OS thread; several workers binding the same address with
//! `SO_REUSEPORT` is how the server fans out across cores.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};

use crate::config::Config;
use crate::conn::{ConnState, OffloadKind};
use crate::conn_table::ConnTable;
use crate::engine::{EngineOutcome, FilterCtx, FilterEngine};
use crate::error::FatalIoError;
use crate::filters;
use crate::net::bind_reuseport;
use crate::offload::{OffloadHandle, OffloadResult};
use crate::timer::{TimerKind, TimerWheel};
use crate::token::{self, split_token};

/// One worker's event loop. Construct with [`Worker::new`], then call
/// [`Worker::run`] (blocks until [`Worker::stop`] is called from another
/// thread, or a fatal I/O error occurs).
pub struct Worker {
    config: Arc<Config>,
    poll: Poll,
    events: Events,
    listeners: Vec<TcpListener>,
    conns: ConnTable,
    timers: TimerWheel,
    engine: FilterEngine,
    offload: OffloadHandle,
    complete_tx: Sender<OffloadResult>,
    complete_rx: Receiver<OffloadResult>,
    waker: Arc<Waker>,
    next_id: u32,
    stopped: Arc<std::sync::atomic::AtomicBool>,
}

impl Worker {
    /// Builds a worker bound to every address in `config.listen`, sharing
    /// `offload` (and its worker threads) with any sibling workers on other
    /// OS threads.
    pub fn new(config: Arc<Config>, offload: OffloadHandle) -> Result<Worker, FatalIoError> {
        let poll = Poll::new().map_err(FatalIoError)?;
        let waker = Arc::new(Waker::new(poll.registry(), token::WAKE_TOKEN).map_err(FatalIoError)?);

        let mut listeners = Vec::with_capacity(config.listen.len());
        for (i, addr) in config.listen.iter().enumerate() {
            let mut listener = bind_reuseport(*addr).map_err(FatalIoError)?;
            poll.registry()
                .register(&mut listener, token::listener_token(i), Interest::READABLE)
                .map_err(FatalIoError)?;
            listeners.push(listener);
        }

        let (complete_tx, complete_rx) = crossbeam_channel::unbounded();

        Ok(Worker {
            events: Events::with_capacity(config.events_num),
            conns: ConnTable::with_capacity(config.max_connections),
            timers: TimerWheel::new(),
            engine: FilterEngine::new(filters::build()),
            offload,
            complete_tx,
            complete_rx,
            waker,
            next_id: 0,
            stopped: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            poll,
            listeners,
            config,
        })
    }

    /// Addresses actually bound, in the order of `config.listen` — useful
    /// when a caller listens on port `0` and needs to learn what the OS
    /// assigned.
    pub fn local_addrs(&self) -> io::Result<Vec<std::net::SocketAddr>> {
        self.listeners.iter().map(|l| l.local_addr()).collect()
    }

    /// A handle other threads can use to ask this worker to stop after its
    /// current `poll()` wakes.
    pub fn stop_handle(&self) -> WorkerStopHandle {
        WorkerStopHandle {
            stopped: self.stopped.clone(),
            waker: self.waker.clone(),
        }
    }

    /// Runs the event loop until stopped.
    pub fn run(&mut self) -> Result<(), FatalIoError> {
        let tick = Duration::from_millis(self.config.timer_interval_msec.max(1));
        let timeout = if self.config.polling_mode { Some(Duration::ZERO) } else { Some(tick) };

        while !self.stopped.load(std::sync::atomic::Ordering::Relaxed) {
            match self.poll.poll(&mut self.events, timeout) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FatalIoError(e)),
            }

            let tokens: Vec<mio::Token> = self.events.iter().map(|e| e.token()).collect();
            for mio_token in tokens {
                if mio_token == token::WAKE_TOKEN {
                    self.drain_offload_completions();
                    continue;
                }
                if let Some(listener_idx) = listener_index(&self.listeners, mio_token) {
                    self.accept_loop(listener_idx);
                    continue;
                }
                self.dispatch_connection_event(mio_token);
            }

            for (fired_token, kind) in self.timers.tick() {
                self.handle_timer(fired_token, kind);
            }
        }
        Ok(())
    }

    fn accept_loop(&mut self, listener_idx: usize) {
        loop {
            let (stream, peer) = match self.listeners[listener_idx].accept() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    log::warn!("accept() failed: {e}");
                    self.timers.add(
                        token::listener_token(listener_idx),
                        TimerKind::AcceptThrottle,
                        self.config.fdlimit_timeout_sec * 1000,
                    );
                    return;
                }
            };

            if self.conns.len() >= self.config.max_connections {
                log::warn!("connection table full, dropping accepted socket from {peer}");
                drop(stream);
                continue;
            }

            self.next_id = self.next_id.wrapping_add(1);
            let id = self.next_id;
            let recv_cap = self.config.receive.buf_size;
            let resp_cap = self.config.response.buf_size;

            let (slot, conn) = self
                .conns
                .alloc(|token| ConnState::new(stream, peer, token, id, recv_cap, resp_cap));
            let token = conn.token;

            if let Err(e) = self
                .poll
                .registry()
                .register(&mut conn.stream, token, Interest::READABLE | Interest::WRITABLE)
            {
                log::warn!("failed to register connection {id}: {e}");
                self.conns.free(slot);
                continue;
            }
            conn.registered = true;

            self.timers.add(token, TimerKind::Receive, self.config.receive.timeout_sec * 1000);
            self.drive(slot);
        }
    }

    fn dispatch_connection_event(&mut self, mio_token: mio::Token) {
        let (slot, side) = split_token(mio_token);
        let is_current = self
            .conns
            .get_mut(slot)
            .map(|c| split_token(c.token).1 == side)
            .unwrap_or(false);
        if !is_current {
            // stale event for a slot that's been freed and recycled
            return;
        }
        self.timers.cancel_all_for(mio_token);
        self.drive(slot);
    }

    fn drain_offload_completions(&mut self) {
        while let Ok(result) = self.complete_rx.try_recv() {
            let mio_token = result.token();
            let (slot, side) = split_token(mio_token);
            let matches = self
                .conns
                .get_mut(slot)
                .map(|c| split_token(c.token).1 == side)
                .unwrap_or(false);
            if !matches {
                continue;
            }
            apply_offload_result(self.conns.get_mut(slot).expect("checked above"), result);
            self.drive(slot);
        }
    }

    fn handle_timer(&mut self, fired_token: Token, kind: TimerKind) {
        match kind {
            TimerKind::AcceptThrottle => {
                if let Some(idx) = listener_index(&self.listeners, fired_token) {
                    self.accept_loop(idx);
                }
            }
            TimerKind::Receive | TimerKind::Send => {
                let (slot, side) = split_token(fired_token);
                let matches = self
                    .conns
                    .get_mut(slot)
                    .map(|c| split_token(c.token).1 == side)
                    .unwrap_or(false);
                if matches {
                    log::debug!("connection timed out, closing slot {slot}");
                    self.close(slot);
                }
            }
        }
    }

    fn drive(&mut self, slot: usize) {
        let date = self.timers.date_string().to_string();
        let now_ms = self.timers.now_ms();
        let ctx = FilterCtx {
            config: &self.config,
            offload: &self.offload,
            complete_tx: &self.complete_tx,
            waker: &self.waker,
            date: &date,
            now_ms,
        };

        loop {
            let conn = match self.conns.get_mut(slot) {
                Some(c) => c,
                None => return,
            };
            match self.engine.run(conn, &ctx) {
                EngineOutcome::Suspended => {
                    let token = conn.token;
                    self.timers.add(token, TimerKind::Receive, self.config.receive.timeout_sec * 1000);
                    return;
                }
                EngineOutcome::KeepAliveReset => continue,
                EngineOutcome::Close => {
                    self.close(slot);
                    return;
                }
            }
        }
    }

    fn close(&mut self, slot: usize) {
        if let Some(conn) = self.conns.get_mut(slot) {
            self.engine.close_all(conn);
            self.timers.cancel_all_for(conn.token);
            if conn.registered {
                let _ = self.poll.registry().deregister(&mut conn.stream);
            }
        }
        self.conns.free(slot);
    }
}

/// Handle used by another thread to request a worker's event loop stop.
#[derive(Clone)]
pub struct WorkerStopHandle {
    stopped: Arc<std::sync::atomic::AtomicBool>,
    waker: Arc<Waker>,
}

impl WorkerStopHandle {
    /// Requests the worker stop; wakes its `poll()` if it's blocked.
    pub fn stop(&self) {
        self.stopped.store(true, std::sync::atomic::Ordering::Relaxed);
        let _ = self.waker.wake();
    }
}

fn listener_index(listeners: &[TcpListener], mio_token: mio::Token) -> Option<usize> {
    (0..listeners.len()).find(|&i| token::listener_token(i) == mio_token)
}

fn apply_offload_result(conn: &mut ConnState, result: OffloadResult) {
    match (conn.offload.take(), result) {
        (Some(OffloadKind::FileOpen), OffloadResult::OpenAndStat { result, .. }) => match result {
            Ok((file, meta)) => {
                // Leave `step` at `Open`: the File filter's `process()` still
                // needs to see this stat once, to run the directory-redirect
                // check and finish the response headers, before it advances
                // to `Read` itself.
                conn.file.is_dir = meta.is_dir();
                conn.file.file = Some(file);
                conn.file.remaining = meta.len();
                conn.file.mtime = meta.modified().ok();
            }
            Err(e) => {
                conn.file.file = None;
                conn.file.remaining = 0;
                conn.file.open_error = Some(e.kind());
            }
        },
        (Some(OffloadKind::FileRead), OffloadResult::ReadChunk { file, result, .. }) => {
            conn.file.file = Some(file);
            match result {
                Ok(bytes) => {
                    conn.file.remaining = conn.file.remaining.saturating_sub(bytes.len() as u64);
                    conn.file.buf = bytes;
                }
                Err(_) => {
                    conn.file.remaining = 0;
                    conn.file.buf.clear();
                }
            }
        }
        (Some(OffloadKind::AccessLogWrite), OffloadResult::WriteAccessLog { .. }) => {}
        _ => {}
    }
}
