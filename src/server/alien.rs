//! `alien_manager`, `alien_client` and `alien_surface` handlers
//!
//! Destruction of any of the three objects, explicit or through client
//! disconnect, goes through `destroyed` and tears down the core state.

use log::warn;
use wayland_server::backend::ClientId;
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use super::ServerState;
use crate::protocol::generated::{alien_client, alien_manager, alien_surface};
use crate::protocol::{AlienClientId, AlienManagerId, AlienState, AlienSurfaceId};
use crate::surface::SurfaceId;

impl GlobalDispatch<alien_manager::AlienManager, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        client: &Client,
        resource: New<alien_manager::AlienManager>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let key = state.client_key(client);
        let id = state.compositor.alien_manager_bound(key);
        let manager = data_init.init(resource, id);
        state.resources.alien_managers.insert(id, manager);
    }
}

impl Dispatch<alien_manager::AlienManager, AlienManagerId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &alien_manager::AlienManager,
        request: alien_manager::Request,
        data: &AlienManagerId,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            alien_manager::Request::CreateAlienClient { id, package } => {
                let alien_client = state.compositor.alien_client_created(*data, &package);
                let resource = data_init.init(id, alien_client);
                if let Some(alien_client) = alien_client {
                    state.resources.alien_clients.insert(alien_client, resource);
                }
            }
            alien_manager::Request::Pong { serial } => state.compositor.alien_pong(serial),
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &alien_manager::AlienManager,
        data: &AlienManagerId,
    ) {
        state.resources.alien_managers.remove(data);
        state.compositor.alien_manager_destroyed(*data);
    }
}

impl Dispatch<alien_client::AlienClient, Option<AlienClientId>> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &alien_client::AlienClient,
        request: alien_client::Request,
        data: &Option<AlienClientId>,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let alien_client::Request::GetAlienSurface { id, surface } = request {
            let surface = surface.data::<SurfaceId>().copied();
            let alien_surface = match (*data, surface) {
                (Some(alien_client), Some(surface)) => state
                    .compositor
                    .alien_surface_created(alien_client, surface),
                _ => None,
            };
            let resource = data_init.init(id, alien_surface);
            match alien_surface {
                Some(alien_surface) => {
                    state.resources.alien_surfaces.insert(alien_surface, resource);
                }
                None => warn!("Refused get_alien_surface, object left inert"),
            }
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &alien_client::AlienClient,
        data: &Option<AlienClientId>,
    ) {
        if let Some(id) = data {
            state.resources.alien_clients.remove(id);
            state.compositor.alien_client_destroyed(*id);
        }
    }
}

impl Dispatch<alien_surface::AlienSurface, Option<AlienSurfaceId>> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &alien_surface::AlienSurface,
        request: alien_surface::Request,
        data: &Option<AlienSurfaceId>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(id) = *data else {
            return;
        };
        match request {
            alien_surface::Request::SetTitle { title } => {
                state.compositor.alien_set_title(id, &title);
            }
            alien_surface::Request::AckConfigure { serial } => {
                state.compositor.alien_ack_configure(id, serial);
            }
            alien_surface::Request::RequestState { states, serial } => {
                state
                    .compositor
                    .alien_request_state(id, AlienState::from_wire(&states), serial);
            }
            alien_surface::Request::SetMinimized => {
                state.compositor.alien_set_minimized(id);
            }
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &alien_surface::AlienSurface,
        data: &Option<AlienSurfaceId>,
    ) {
        if let Some(id) = data {
            state.resources.alien_surfaces.remove(id);
            state.compositor.alien_surface_destroyed(*id);
        }
    }
}
