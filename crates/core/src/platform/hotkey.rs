use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Listen for the global emergency-stop hotkey (Cmd+Shift+Period) on a
/// background thread. Sets `flag` each time it fires; the consumer clears it.
#[cfg(target_os = "macos")]
pub fn start_emergency_listener(flag: Arc<AtomicBool>) {
    use std::ffi::c_void;
    use std::sync::atomic::Ordering;

    use core_foundation::base::TCFType;
    use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
    use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};

    type EventRef = *mut c_void;
    type TapCallback = unsafe extern "C" fn(*mut c_void, u32, EventRef, *mut c_void) -> EventRef;

    const HID_EVENT_TAP: u32 = 0;
    const HEAD_INSERT: u32 = 0;
    const LISTEN_ONLY: u32 = 1;
    const KEY_DOWN: u32 = 10;
    const KEYCODE_FIELD: u32 = 9;
    const KEYCODE_PERIOD: i64 = 0x2F;

    const FLAG_SHIFT: u64 = 0x0002_0000;
    const FLAG_CONTROL: u64 = 0x0004_0000;
    const FLAG_ALTERNATE: u64 = 0x0008_0000;
    const FLAG_COMMAND: u64 = 0x0010_0000;

    extern "C" {
        fn CGEventTapCreate(
            tap: u32,
            place: u32,
            options: u32,
            events_of_interest: u64,
            callback: TapCallback,
            user_info: *mut c_void,
        ) -> CFMachPortRef;
        fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
        fn CGEventGetFlags(event: EventRef) -> u64;
        fn CGEventGetIntegerValueField(event: EventRef, field: u32) -> i64;
    }

    unsafe extern "C" fn on_event(_proxy: *mut c_void, kind: u32, event: EventRef, user_info: *mut c_void) -> EventRef {
        if kind != KEY_DOWN {
            return event;
        }
        let (flags, keycode) = unsafe {
            (CGEventGetFlags(event), CGEventGetIntegerValueField(event, KEYCODE_FIELD))
        };
        let wanted = FLAG_COMMAND | FLAG_SHIFT;
        let exact = flags & (wanted | FLAG_CONTROL | FLAG_ALTERNATE) == wanted;
        if keycode == KEYCODE_PERIOD && exact {
            // user_info is the AtomicBool leaked in the thread below; it lives for the process
            let flag = unsafe { &*(user_info as *const AtomicBool) };
            flag.store(true, Ordering::Release);
        }
        event
    }

    std::thread::spawn(move || {
        let flag_ptr = Arc::into_raw(flag) as *mut c_void;
        let port_ref = unsafe {
            CGEventTapCreate(HID_EVENT_TAP, HEAD_INSERT, LISTEN_ONLY, 1 << KEY_DOWN, on_event, flag_ptr)
        };
        if port_ref.is_null() {
            crate::logger::error(
                "emergency hotkey unavailable: grant Accessibility permission to your terminal",
            );
            drop(unsafe { Arc::from_raw(flag_ptr as *const AtomicBool) });
            return;
        }

        let port = unsafe { CFMachPort::wrap_under_create_rule(port_ref) };
        let source = match port.create_runloop_source(0) {
            Ok(s) => s,
            Err(_) => {
                crate::logger::error("emergency hotkey: failed to create run loop source");
                return;
            }
        };
        let run_loop = CFRunLoop::get_current();
        run_loop.add_source(&source, unsafe { kCFRunLoopCommonModes });
        unsafe { CGEventTapEnable(port_ref, true) };
        crate::logger::info("emergency hotkey Cmd+Shift+. registered");

        CFRunLoop::run_current(); // blocks forever
    });
}

#[cfg(not(target_os = "macos"))]
pub fn start_emergency_listener(_flag: Arc<AtomicBool>) {
    crate::logger::info("no global emergency hotkey on this platform; use Esc in the TUI");
}
