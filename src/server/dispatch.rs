//! Core protocol handlers: `wl_compositor`, `wl_surface`, `wl_region`,
//! `wl_callback`, `wl_shm`, `wl_shm_pool` and `wl_buffer`

use log::debug;
use wayland_server::backend::ClientId;
use wayland_server::protocol::{
    wl_buffer, wl_callback, wl_compositor, wl_region, wl_shm, wl_shm_pool, wl_surface,
};
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use super::{BufferData, PendingCommit, ServerState};
use crate::surface::{CallbackId, SurfaceCommit, SurfaceId};
use crate::window::Size;

impl GlobalDispatch<wl_compositor::WlCompositor, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_compositor::WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<wl_compositor::WlCompositor, ()> for ServerState {
    fn request(
        state: &mut Self,
        client: &Client,
        _resource: &wl_compositor::WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                let key = state.client_key(client);
                let surface = state.compositor.surface_created(key);
                data_init.init(id, surface);
            }
            wl_compositor::Request::CreateRegion { id } => {
                data_init.init(id, ());
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_surface::WlSurface, SurfaceId> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_surface::WlSurface,
        request: wl_surface::Request,
        data: &SurfaceId,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let surface = *data;
        match request {
            wl_surface::Request::Attach { buffer, .. } => {
                state.pending.entry(surface).or_default().buffer = Some(buffer);
            }
            wl_surface::Request::Damage {
                x,
                y,
                width,
                height,
            }
            | wl_surface::Request::DamageBuffer {
                x,
                y,
                width,
                height,
            } => {
                state
                    .pending
                    .entry(surface)
                    .or_default()
                    .damage
                    .push((x, y, width, height));
            }
            wl_surface::Request::Frame { callback } => {
                let id = state.compositor.frame_requested(surface);
                let resource = data_init.init(callback, id);
                match id {
                    Some(id) => {
                        state.resources.callbacks.insert(id, resource);
                    }
                    None => resource.done(state.compositor.current_time_ms()),
                }
            }
            wl_surface::Request::Commit => {
                let pending = state.pending.remove(&surface).unwrap_or_default();
                let commit = state.apply_pending(surface, pending);
                state.compositor.surface_committed(surface, commit);
            }
            wl_surface::Request::Destroy => {
                debug!("wl_surface.destroy for {}", surface);
            }
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &wl_surface::WlSurface,
        data: &SurfaceId,
    ) {
        state.pending.remove(data);
        state.resources.buffers.remove(data);
        state.compositor.surface_destroyed(*data);
    }
}

impl ServerState {
    /// Turns the attached buffer into a size for the core and keeps the
    /// buffer resource for its later release.
    fn apply_pending(&mut self, surface: SurfaceId, pending: PendingCommit) -> SurfaceCommit {
        let buffer = pending.buffer.map(|buffer| {
            let previous = match &buffer {
                Some(buffer) => self.resources.buffers.insert(surface, buffer.clone()),
                None => self.resources.buffers.remove(&surface),
            };
            if let Some(previous) = previous {
                if Some(&previous) != buffer.as_ref() {
                    previous.release();
                }
            }
            buffer.map(|buffer| {
                buffer
                    .data::<BufferData>()
                    .map(|data| data.size)
                    .unwrap_or_default()
            })
        });
        SurfaceCommit {
            buffer,
            damage: pending.damage,
        }
    }
}

impl Dispatch<wl_region::WlRegion, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_region::WlRegion,
        _request: wl_region::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl Dispatch<wl_callback::WlCallback, Option<CallbackId>> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_callback::WlCallback,
        _request: wl_callback::Request,
        _data: &Option<CallbackId>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &wl_callback::WlCallback,
        data: &Option<CallbackId>,
    ) {
        if let Some(id) = data {
            state.resources.callbacks.remove(id);
        }
    }
}

impl GlobalDispatch<wl_shm::WlShm, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_shm::WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let shm = data_init.init(resource, ());
        shm.format(wl_shm::Format::Argb8888);
        shm.format(wl_shm::Format::Xrgb8888);
    }
}

impl Dispatch<wl_shm::WlShm, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_shm::WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm::Request::CreatePool { id, .. } = request {
            data_init.init(id, ());
        }
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_shm_pool::WlShmPool,
        request: wl_shm_pool::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm_pool::Request::CreateBuffer {
            id, width, height, ..
        } = request
        {
            data_init.init(
                id,
                BufferData {
                    size: Size::new(width, height),
                },
            );
            debug!("Buffer created ({}x{})", width, height);
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, BufferData> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_buffer::WlBuffer,
        _request: wl_buffer::Request,
        _data: &BufferData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}
