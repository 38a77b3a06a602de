//! `wp_viewporter` and `wp_fractional_scale_manager_v1` handlers

use log::debug;
use wayland_protocols::wp::fractional_scale::v1::server::{
    wp_fractional_scale_manager_v1, wp_fractional_scale_v1,
};
use wayland_protocols::wp::viewporter::server::{wp_viewport, wp_viewporter};
use wayland_server::backend::ClientId;
use wayland_server::protocol::wl_surface::WlSurface;
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use super::ServerState;
use crate::error::CompositorError;
use crate::surface::{ExtensionObjectId, SurfaceId};

/// User data of an extension object: the surface it was created for and its
/// core-side id. `object` is `None` when creation was refused.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionData {
    surface: SurfaceId,
    object: Option<ExtensionObjectId>,
}

fn surface_id(surface: &WlSurface) -> Option<SurfaceId> {
    surface.data::<SurfaceId>().copied()
}

// === wp_viewporter ===

impl GlobalDispatch<wp_viewporter::WpViewporter, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wp_viewporter::WpViewporter>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<wp_viewporter::WpViewporter, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &wp_viewporter::WpViewporter,
        request: wp_viewporter::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wp_viewporter::Request::GetViewport { id, surface } = request {
            let Some(surface) = surface_id(&surface) else {
                data_init.init(
                    id,
                    ExtensionData {
                        surface: SurfaceId(0),
                        object: None,
                    },
                );
                return;
            };
            let object = match state.compositor.create_viewport(surface) {
                Ok(object) => Some(object),
                Err(e) => {
                    resource.post_error(wp_viewporter::Error::ViewportExists, e.to_string());
                    None
                }
            };
            data_init.init(id, ExtensionData { surface, object });
        }
    }
}

impl Dispatch<wp_viewport::WpViewport, ExtensionData> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &wp_viewport::WpViewport,
        request: wp_viewport::Request,
        data: &ExtensionData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(object) = data.object else {
            return;
        };
        let result = match request {
            wp_viewport::Request::SetSource {
                x,
                y,
                width,
                height,
            } => state
                .compositor
                .viewport_set_source(data.surface, object, x, y, width, height),
            wp_viewport::Request::SetDestination { width, height } => state
                .compositor
                .viewport_set_destination(data.surface, object, width, height),
            _ => Ok(()),
        };
        if let Err(CompositorError::BadValue(message)) = result {
            resource.post_error(wp_viewport::Error::BadValue, message);
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &wp_viewport::WpViewport,
        data: &ExtensionData,
    ) {
        if let Some(object) = data.object {
            state.compositor.destroy_viewport(data.surface, object);
        }
    }
}

// === wp_fractional_scale_manager_v1 ===

impl GlobalDispatch<wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1, ()>
    for ServerState
{
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1,
        request: wp_fractional_scale_manager_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wp_fractional_scale_manager_v1::Request::GetFractionalScale { id, surface } =
            request
        {
            let surface = surface_id(&surface).unwrap_or(SurfaceId(0));
            let object = match state.compositor.create_fractional_scale(surface) {
                Ok(object) => Some(object),
                Err(e) => {
                    resource.post_error(
                        wp_fractional_scale_manager_v1::Error::FractionalScaleExists,
                        e.to_string(),
                    );
                    None
                }
            };
            let scale = data_init.init(id, ExtensionData { surface, object });
            if let Some(object) = object {
                state.resources.fractional_scales.insert(object, scale);
            }
        }
    }
}

impl Dispatch<wp_fractional_scale_v1::WpFractionalScaleV1, ExtensionData> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wp_fractional_scale_v1::WpFractionalScaleV1,
        _request: wp_fractional_scale_v1::Request,
        _data: &ExtensionData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        _resource: &wp_fractional_scale_v1::WpFractionalScaleV1,
        data: &ExtensionData,
    ) {
        if let Some(object) = data.object {
            debug!("Fractional scale object of {} destroyed", data.surface);
            state.resources.fractional_scales.remove(&object);
            state
                .compositor
                .destroy_fractional_scale(data.surface, object);
        }
    }
}
