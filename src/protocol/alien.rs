//! Alien lifecycle protocol state
//!
//! Application runtimes hosting foreign (non-native) apps bind
//! `alien_manager`, create one `alien_client` per hosted package and one
//! `alien_surface` per window surface. The compositor drives:
//!
//! - a configure/ack handshake carrying size and HIDDEN/COVER flags
//! - a ping/pong liveness check keyed by serial
//! - OOM score hints per process
//!
//! Configure handshake rules:
//! 1. every configure carries a fresh serial, which becomes both the
//!    outstanding serial and the last sent serial
//! 2. `ack_configure` clears the outstanding serial only on an exact match
//! 3. a `request_state` that un-hides a hidden/covered surface with the last
//!    sent serial is answered with a raise, anything else with a new configure
//!
//! Ping table rules: one outstanding ping per surface (a newer ping replaces
//! the older entry), entries of destroyed surfaces are pruned, pongs for
//! unknown serials are ignored. There is no timeout.

use std::collections::HashMap;

use bitflags::bitflags;
use log::debug;

use super::{AlienClientId, AlienManagerId, AlienSurfaceId, ProtocolEvent};
use crate::serial::{Serial, SerialGenerator};
use crate::surface::{ClientKey, SurfaceId};
use crate::window::Size;

bitflags! {
    /// `alien_surface.state` values
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AlienState: u32 {
        const HIDDEN = 1;
        const COVER = 2;
    }
}

impl AlienState {
    /// Encodes the flags as a wire array of `u32` enum values.
    pub fn to_wire(self) -> Vec<u8> {
        self.iter()
            .flat_map(|flag| flag.bits().to_ne_bytes())
            .collect()
    }

    /// Decodes a wire array. Unknown values are dropped.
    pub fn from_wire(bytes: &[u8]) -> Self {
        bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .fold(AlienState::empty(), |states, value| {
                states | AlienState::from_bits_truncate(value)
            })
    }
}

#[derive(Debug, Clone)]
pub struct AlienManager {
    pub id: AlienManagerId,
    pub client: ClientKey,
}

#[derive(Debug, Clone)]
pub struct AlienClient {
    pub id: AlienClientId,
    pub manager: AlienManagerId,
    pub client: ClientKey,
    pub package: String,
    pub process_id: i32,
}

#[derive(Debug, Clone)]
pub struct AlienSurface {
    pub id: AlienSurfaceId,
    pub alien_client: AlienClientId,
    pub client: ClientKey,
    pub surface: SurfaceId,
    pub title: String,
    pub hidden: bool,
    pub cover: bool,
    pub size: Size,
    serial: Option<Serial>,
    last_serial: Option<Serial>,
}

impl AlienSurface {
    pub fn states(&self) -> AlienState {
        let mut states = AlienState::empty();
        states.set(AlienState::HIDDEN, self.hidden);
        states.set(AlienState::COVER, self.cover);
        states
    }

    /// Serial of the configure still awaiting its ack.
    pub fn outstanding_serial(&self) -> Option<Serial> {
        self.serial
    }

    pub fn last_serial(&self) -> Option<Serial> {
        self.last_serial
    }
}

/// Result of a client `request_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRequestOutcome {
    /// The window of this surface must be raised by the compositor.
    Raise(SurfaceId),
    /// A fresh configure was sent instead.
    Reconfigured(Serial),
    /// Unknown alien surface.
    Ignored,
}

#[derive(Debug)]
pub struct AlienLifecycle {
    managers: HashMap<AlienManagerId, AlienManager>,
    clients: HashMap<AlienClientId, AlienClient>,
    surfaces: HashMap<AlienSurfaceId, AlienSurface>,
    pings: HashMap<u32, AlienSurfaceId>,
    next_object_id: u64,
}

impl Default for AlienLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl AlienLifecycle {
    pub fn new() -> Self {
        Self {
            managers: HashMap::new(),
            clients: HashMap::new(),
            surfaces: HashMap::new(),
            pings: HashMap::new(),
            next_object_id: 1,
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    // === Object lifecycle ===

    pub fn bind_manager(&mut self, client: ClientKey) -> AlienManagerId {
        let id = AlienManagerId(self.allocate());
        self.managers.insert(id, AlienManager { id, client });
        id
    }

    pub fn destroy_manager(&mut self, id: AlienManagerId) -> bool {
        self.managers.remove(&id).is_some()
    }

    pub fn create_client(
        &mut self,
        manager: AlienManagerId,
        package: &str,
        process_id: i32,
    ) -> Option<AlienClientId> {
        let client = self.managers.get(&manager)?.client;
        let id = AlienClientId(self.allocate());
        self.clients.insert(
            id,
            AlienClient {
                id,
                manager,
                client,
                package: package.to_string(),
                process_id,
            },
        );
        debug!("{} created for package {:?}", id, package);
        Some(id)
    }

    pub fn destroy_client(&mut self, id: AlienClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    /// Creates the alien state for `surface`. The caller sends the initial
    /// configure. A surface carries at most one alien surface; a second
    /// request for it is refused.
    pub fn create_surface(
        &mut self,
        alien_client: AlienClientId,
        surface: SurfaceId,
        size: Size,
    ) -> Option<AlienSurfaceId> {
        let client = self.clients.get(&alien_client)?.client;
        if let Some(existing) = self.surface_for(surface) {
            debug!("{} already has {}", surface, existing);
            return None;
        }
        let id = AlienSurfaceId(self.allocate());
        self.surfaces.insert(
            id,
            AlienSurface {
                id,
                alien_client,
                client,
                surface,
                title: String::new(),
                hidden: false,
                cover: false,
                size,
                serial: None,
                last_serial: None,
            },
        );
        Some(id)
    }

    /// Removes the surface state and every ping still waiting on it.
    pub fn destroy_surface(&mut self, id: AlienSurfaceId) -> Option<AlienSurface> {
        let surface = self.surfaces.remove(&id)?;
        self.pings.retain(|_, waiting| *waiting != id);
        Some(surface)
    }

    pub fn manager(&self, id: AlienManagerId) -> Option<&AlienManager> {
        self.managers.get(&id)
    }

    pub fn client(&self, id: AlienClientId) -> Option<&AlienClient> {
        self.clients.get(&id)
    }

    pub fn surface(&self, id: AlienSurfaceId) -> Option<&AlienSurface> {
        self.surfaces.get(&id)
    }

    /// Alien surface attached to a compositor surface.
    pub fn surface_for(&self, surface: SurfaceId) -> Option<AlienSurfaceId> {
        self.surfaces
            .values()
            .find(|s| s.surface == surface)
            .map(|s| s.id)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &AlienSurface> {
        self.surfaces.values()
    }

    /// Live manager resource through which `client` can be reached.
    fn reachable_manager(&self, alien_client: AlienClientId) -> Option<AlienManagerId> {
        let owner = self.clients.get(&alien_client);
        if let Some(owner) = owner {
            if self.managers.contains_key(&owner.manager) {
                return Some(owner.manager);
            }
        }
        let client = owner.map(|c| c.client)?;
        self.managers
            .values()
            .find(|m| m.client == client)
            .map(|m| m.id)
    }

    // === Configure / ack ===

    /// Sends a configure with the surface's current size and flags.
    pub fn send_configure(
        &mut self,
        id: AlienSurfaceId,
        serials: &SerialGenerator,
        out: &mut Vec<ProtocolEvent>,
    ) -> Option<Serial> {
        let surface = self.surfaces.get_mut(&id)?;
        let serial = serials.next_serial();
        surface.serial = Some(serial);
        surface.last_serial = Some(serial);

        out.push(ProtocolEvent::AlienConfigure {
            surface: id,
            width: surface.size.width,
            height: surface.size.height,
            states: surface.states(),
            serial: serial.value(),
        });
        Some(serial)
    }

    /// Returns true if `serial` acknowledged the outstanding configure.
    pub fn ack_configure(&mut self, id: AlienSurfaceId, serial: u32) -> bool {
        let Some(surface) = self.surfaces.get_mut(&id) else {
            return false;
        };
        if surface.serial.map(Serial::value) == Some(serial) {
            surface.serial = None;
            true
        } else {
            debug!("{}: stale ack_configure {}", id, serial);
            false
        }
    }

    pub fn request_state(
        &mut self,
        id: AlienSurfaceId,
        states: AlienState,
        serial: u32,
        serials: &SerialGenerator,
        out: &mut Vec<ProtocolEvent>,
    ) -> StateRequestOutcome {
        let Some(surface) = self.surfaces.get_mut(&id) else {
            return StateRequestOutcome::Ignored;
        };

        let was_hidden_or_cover = surface.hidden || surface.cover;
        surface.hidden = states.contains(AlienState::HIDDEN);
        surface.cover = states.contains(AlienState::COVER);

        let matches_last = surface.last_serial.map(Serial::value) == Some(serial);
        if was_hidden_or_cover && !surface.hidden && matches_last {
            debug!("{}: shown by client, raising", id);
            return StateRequestOutcome::Raise(surface.surface);
        }

        match self.send_configure(id, serials, out) {
            Some(serial) => StateRequestOutcome::Reconfigured(serial),
            None => StateRequestOutcome::Ignored,
        }
    }

    // === Compositor side changes ===

    pub fn set_title(&mut self, id: AlienSurfaceId, title: &str) -> Option<SurfaceId> {
        let surface = self.surfaces.get_mut(&id)?;
        surface.title = title.to_string();
        Some(surface.surface)
    }

    /// Updates the HIDDEN flag and sends a configure if it changed.
    pub fn set_hidden(
        &mut self,
        id: AlienSurfaceId,
        hidden: bool,
        serials: &SerialGenerator,
        out: &mut Vec<ProtocolEvent>,
    ) -> Option<Serial> {
        let surface = self.surfaces.get_mut(&id)?;
        if surface.hidden == hidden {
            return None;
        }
        surface.hidden = hidden;
        self.send_configure(id, serials, out)
    }

    /// Updates the COVER flag and sends a configure if it changed.
    pub fn set_cover(
        &mut self,
        id: AlienSurfaceId,
        cover: bool,
        serials: &SerialGenerator,
        out: &mut Vec<ProtocolEvent>,
    ) -> Option<Serial> {
        let surface = self.surfaces.get_mut(&id)?;
        if surface.cover == cover {
            return None;
        }
        surface.cover = cover;
        self.send_configure(id, serials, out)
    }

    pub fn resize(
        &mut self,
        id: AlienSurfaceId,
        size: Size,
        serials: &SerialGenerator,
        out: &mut Vec<ProtocolEvent>,
    ) -> Option<Serial> {
        let surface = self.surfaces.get_mut(&id)?;
        if surface.size == size {
            return None;
        }
        surface.size = size;
        self.send_configure(id, serials, out)
    }

    pub fn close(&mut self, id: AlienSurfaceId, out: &mut Vec<ProtocolEvent>) -> bool {
        if !self.surfaces.contains_key(&id) {
            return false;
        }
        out.push(ProtocolEvent::AlienClose { surface: id });
        true
    }

    /// Sends `oom_score` to every alien client of `process_id`.
    pub fn set_oom_score(
        &mut self,
        process_id: i32,
        score: i32,
        out: &mut Vec<ProtocolEvent>,
    ) -> usize {
        let mut targets: Vec<_> = self
            .clients
            .values()
            .filter(|c| c.process_id == process_id)
            .map(|c| c.id)
            .collect();
        targets.sort();
        for client in &targets {
            out.push(ProtocolEvent::AlienOomScore {
                client: *client,
                score,
            });
        }
        targets.len()
    }

    // === Ping / pong ===

    /// Records a ping for `id` and sends it if the client still has a live
    /// manager. Any older ping of the same surface is forgotten.
    pub fn ping(
        &mut self,
        id: AlienSurfaceId,
        serials: &SerialGenerator,
        out: &mut Vec<ProtocolEvent>,
    ) -> Option<Serial> {
        let alien_client = self.surfaces.get(&id)?.alien_client;
        let serial = serials.next_serial();

        self.pings.retain(|_, waiting| *waiting != id);
        self.pings.insert(serial.value(), id);

        match self.reachable_manager(alien_client) {
            Some(manager) => out.push(ProtocolEvent::AlienPing {
                manager,
                serial: serial.value(),
            }),
            None => debug!("{}: client has no manager, ping {} not sent", id, serial.value()),
        }
        Some(serial)
    }

    /// Resolves a pong. Unknown serials are ignored.
    pub fn pong(&mut self, serial: u32) -> Option<AlienSurfaceId> {
        let surface = self.pings.remove(&serial);
        if surface.is_none() {
            debug!("pong for unknown serial {}", serial);
        }
        surface
    }

    pub fn pending_pings(&self) -> usize {
        self.pings.len()
    }
}
