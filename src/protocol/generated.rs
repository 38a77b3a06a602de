//! Server-side bindings for `protocols/alien-manager.xml`

#![allow(non_upper_case_globals, non_snake_case, non_camel_case_types, unused_imports)]

use wayland_server::{self, protocol::*};

pub mod __interfaces {
    use wayland_backend;
    use wayland_server::protocol::__interfaces::*;
    wayland_scanner::generate_interfaces!("protocols/alien-manager.xml");
}
use self::__interfaces::*;

wayland_scanner::generate_server_code!("protocols/alien-manager.xml");
