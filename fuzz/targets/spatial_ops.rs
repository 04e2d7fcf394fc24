#![no_main]

use arbitrary::Arbitrary;
use gridcast::{Channel, SpatialListenerParams, SpatialRouter, WorldPoint};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Register { x: i16, y: i16, radius: u16 },
    Move { index: u8, x: i16, y: i16, radius: Option<u16> },
    Unregister { index: u8 },
    Broadcast { x: i16, y: i16 },
}

#[derive(Clone, Copy)]
struct Ping;

fn point(x: i16, y: i16) -> WorldPoint {
    WorldPoint::new(f64::from(x) * 10.0, f64::from(y) * 10.0, 0.0)
}

fuzz_target!(|ops: Vec<Op>| {
    let router = SpatialRouter::new();
    let Ok(channel) = Channel::new("Fuzz") else {
        return;
    };
    let mut handles = Vec::new();

    for op in ops {
        match op {
            Op::Register { x, y, radius } => handles.push(router.register_listener::<Ping, _>(
                &channel,
                SpatialListenerParams::new(point(x, y), f64::from(radius % 4096)),
                |_| {},
            )),
            Op::Move { index, x, y, radius } if !handles.is_empty() => {
                let handle = &handles[usize::from(index) % handles.len()];
                router.update_listener_location(handle, point(x, y), radius.map(|r| f64::from(r % 4096)));
            }
            Op::Unregister { index } if !handles.is_empty() => {
                let mut handle = handles.remove(usize::from(index) % handles.len());
                router.unregister(&mut handle);
            }
            Op::Broadcast { x, y } => {
                router.broadcast(&channel, &mut Ping, point(x, y));
            }
            _ => {}
        }
        // Сетка обязана оставаться согласованной после каждой операции.
        assert!(router.check_consistency().is_ok());
    }
});
