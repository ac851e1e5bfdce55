//! Per-client outbound queues. Each connected WebSocket gets a bounded,
//! drop-oldest queue so a slow client never stalls the broadcaster: once
//! full, the oldest queued message is evicted to make room for the newest.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chatstorm_protocol::ServerMessage;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// A single client's outbound mailbox.
pub struct ClientQueue {
    depth: usize,
    inner: Mutex<VecDeque<ServerMessage>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl ClientQueue {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a message, evicting the oldest entry if the queue is full.
    pub fn push(&self, msg: ServerMessage) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        {
            let mut q = self.inner.lock();
            if q.len() >= self.depth {
                q.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            q.push_back(msg);
        }
        self.notify.notify_one();
    }

    /// Wait for and return the next message, or `None` once closed with an
    /// empty queue.
    pub async fn recv(&self) -> Option<ServerMessage> {
        loop {
            {
                let mut q = self.inner.lock();
                if let Some(msg) = q.pop_front() {
                    return Some(msg);
                }
                if self.closed.load(Ordering::Relaxed) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Tracks connected clients per room so the broadcaster can fan out without
/// knowing anything about WebSocket plumbing.
#[derive(Default)]
pub struct ClientRegistry {
    rooms: parking_lot::RwLock<HashMap<String, HashMap<String, Arc<ClientQueue>>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client in `room_id`, returning its queue.
    pub fn register(&self, room_id: &str, client_id: String, depth: usize) -> Arc<ClientQueue> {
        let queue = Arc::new(ClientQueue::new(depth));
        self.rooms
            .write()
            .entry(room_id.to_string())
            .or_default()
            .insert(client_id, queue.clone());
        queue
    }

    pub fn deregister(&self, room_id: &str, client_id: &str) {
        let mut rooms = self.rooms.write();
        if let Some(clients) = rooms.get_mut(room_id) {
            if let Some(queue) = clients.remove(client_id) {
                queue.close();
            }
            if clients.is_empty() {
                rooms.remove(room_id);
            }
        }
    }

    /// Push `msg` onto every client queue subscribed to `room_id`.
    pub fn fan_out(&self, room_id: &str, msg: ServerMessage) -> usize {
        let rooms = self.rooms.read();
        let Some(clients) = rooms.get(room_id) else {
            return 0;
        };
        for queue in clients.values() {
            queue.push(msg.clone());
        }
        clients.len()
    }

    pub fn client_count(&self, room_id: &str) -> usize {
        self.rooms.read().get(room_id).map(|c| c.len()).unwrap_or(0)
    }

    pub fn total_clients(&self) -> usize {
        self.rooms.read().values().map(|c| c.len()).sum()
    }
}
