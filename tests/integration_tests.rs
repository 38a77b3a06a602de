//! Integration tests for the Lipstick compositor
//!
//! These drive the public API the way the Wayland frontend does and check
//! the observable results: counts, listener events and the protocol outbox.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serial_test::serial;

use lipstick::{
    dbus::{UpdatesController, UpdatesReply},
    protocol::{AlienState, ProtocolEvent},
    session::{RetryOutcome, SessionActivation, SessionActivator},
    surface::ClientKey,
    window::Size,
    CompositorEvent, DisplayState, LipstickCompositor, LipstickConfig, SurfaceCommit, SurfaceId,
    WindowId,
};

fn commit(width: i32, height: i32) -> SurfaceCommit {
    SurfaceCommit {
        buffer: Some(Some(Size::new(width, height))),
        damage: Vec::new(),
    }
}

fn map(compositor: &mut LipstickCompositor, client: ClientKey) -> (SurfaceId, WindowId) {
    let surface = compositor.surface_created(client);
    compositor.surface_committed(surface, commit(480, 854));
    let window = compositor.surface(surface).and_then(|s| s.window).unwrap();
    (surface, window)
}

/// Full client session: several windows, a disconnect, ghost cleanup
#[test]
#[serial]
fn test_client_session_lifecycle() -> Result<()> {
    let mut compositor = LipstickCompositor::try_new(&LipstickConfig::default())?;
    let counts = Rc::new(RefCell::new(Vec::new()));
    let sink = counts.clone();
    compositor.add_listener(move |event| {
        if let CompositorEvent::WindowCountChanged(n) | CompositorEvent::GhostWindowCountChanged(n) =
            event
        {
            sink.borrow_mut().push(*n);
        }
    });

    let client = compositor.client_connected(4242);
    let (_, first) = map(&mut compositor, client);
    let (second_surface, second) = map(&mut compositor, client);
    assert_eq!(compositor.window_ids(), vec![first, second]);
    assert_eq!(compositor.topmost_window_id(), second);
    assert_eq!(compositor.topmost_window_process_id(), 4242);

    compositor.surface_committed(
        second_surface,
        SurfaceCommit {
            buffer: Some(None),
            damage: Vec::new(),
        },
    );
    assert_eq!(compositor.topmost_window_id(), first);
    assert_eq!(compositor.ghost_window_ids(), vec![second]);

    compositor.client_disconnected(client);
    assert_eq!(compositor.window_count(), 0);
    assert_eq!(compositor.ghost_window_count(), 2);
    assert_eq!(compositor.topmost_window_id(), WindowId::NONE);
    assert_eq!(compositor.topmost_window_process_id(), 0);

    compositor.dispatch_deferred();
    assert_eq!(compositor.ghost_window_count(), 0);
    assert_eq!(compositor.total_window_count(), 0);
    assert_eq!(compositor.surface_count(), 0);
    assert_eq!(counts.borrow().last(), Some(&0));
    Ok(())
}

/// Alien client handshake as seen on the wire
#[test]
#[serial]
fn test_alien_handshake_on_the_wire() -> Result<()> {
    let mut compositor = LipstickCompositor::try_new(&LipstickConfig::default())?;
    let client = compositor.client_connected(7);
    let (surface, window) = map(&mut compositor, client);

    let manager = compositor.alien_manager_bound(client);
    let alien_client = compositor
        .alien_client_created(manager, "harbour-app")
        .ok_or_else(|| anyhow!("alien client refused"))?;
    let alien_surface = compositor
        .alien_surface_created(alien_client, surface)
        .ok_or_else(|| anyhow!("alien surface refused"))?;

    let initial = match compositor.take_outbox().as_slice() {
        [ProtocolEvent::AlienConfigure {
            surface,
            width: 480,
            height: 854,
            serial,
            ..
        }] if *surface == alien_surface => *serial,
        other => return Err(anyhow!("unexpected outbox {:?}", other)),
    };

    compositor.alien_ack_configure(alien_surface, initial);
    let state = compositor.alien().surface(alien_surface).unwrap();
    assert!(state.outstanding_serial().is_none());

    let cover = compositor.set_window_cover(window, true).unwrap();
    match compositor.take_outbox().as_slice() {
        [ProtocolEvent::AlienConfigure { states, serial, .. }] => {
            assert_eq!(*states, AlienState::COVER);
            assert_eq!(*serial, cover.value());
        }
        other => return Err(anyhow!("unexpected outbox {:?}", other)),
    }

    // a stale ack leaves the newer serial outstanding
    compositor.alien_ack_configure(alien_surface, initial);
    let state = compositor.alien().surface(alien_surface).unwrap();
    assert_eq!(state.outstanding_serial(), Some(cover));
    Ok(())
}

/// Display power transitions gate frame callbacks
#[test]
#[serial]
fn test_display_off_releases_waiting_clients() -> Result<()> {
    let mut compositor = LipstickCompositor::try_new(&LipstickConfig::default())?;
    let client = compositor.client_connected(1);
    let (surface, _) = map(&mut compositor, client);
    let callback = compositor.frame_requested(surface).unwrap();

    compositor.display_state_changed(DisplayState::Off);
    assert!(!compositor.updates_enabled());
    assert!(compositor
        .take_outbox()
        .iter()
        .any(|e| matches!(e, ProtocolEvent::FrameDone { callback: c, .. } if *c == callback)));

    compositor.display_state_changed(DisplayState::On);
    assert!(compositor.updates_enabled());
    assert!(compositor.display_visible());
    Ok(())
}

/// The D-Bus controller applied to a compositor
#[test]
#[serial]
fn test_updates_controller_drives_compositor() -> Result<()> {
    let mut compositor = LipstickCompositor::try_new(&LipstickConfig::default())?;
    let mut controller = UpdatesController::new();

    controller.submit(":1.5", false, "first");
    controller.submit(":1.9", true, "intruder");
    assert!(controller.drain().is_empty());

    controller.authorized_owner_changed(Some(":1.5".to_string()));
    let mut denied = Vec::new();
    for call in controller.drain() {
        match call.reply {
            UpdatesReply::Granted(enabled) => compositor.set_updates_enabled(enabled),
            UpdatesReply::Denied => denied.push(call.token),
        }
    }
    assert!(!compositor.updates_enabled());
    assert_eq!(denied, vec!["intruder"]);
    Ok(())
}

struct FlakySession {
    failures_left: u32,
    calls: Rc<RefCell<u32>>,
}

impl SessionActivator for FlakySession {
    fn activate(&mut self) -> Result<()> {
        *self.calls.borrow_mut() += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(anyhow!("logind not ready"));
        }
        Ok(())
    }
}

#[test]
fn test_session_activation_retries_then_succeeds() {
    let calls = Rc::new(RefCell::new(0));
    let interval = Duration::from_millis(1000);
    let mut activation = SessionActivation::new(
        FlakySession {
            failures_left: 3,
            calls: calls.clone(),
        },
        10,
        interval,
    );

    assert_eq!(activation.start(), RetryOutcome::RetryAfter(interval));
    assert_eq!(activation.retry(), RetryOutcome::RetryAfter(interval));
    assert_eq!(activation.retry(), RetryOutcome::RetryAfter(interval));
    assert_eq!(activation.retry(), RetryOutcome::Activated);
    assert_eq!(activation.retry(), RetryOutcome::Activated);
    assert_eq!(*calls.borrow(), 4);
}

#[test]
fn test_config_file_drives_compositor_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("compositor.toml");
    std::fs::write(
        &path,
        r#"
[compositor]
synthesize_back_event = true

[display]
output_width = 720
output_height = 1280
scale = 2.0
"#,
    )?;

    let config = LipstickConfig::load(&path)?;
    assert!(config.compositor.synthesize_back_event);
    assert_eq!(config.display.output_width, 720);
    assert!((config.display.scale - 2.0).abs() < f64::EPSILON);
    assert!(config.dbus.enabled);
    Ok(())
}
