//! Full poll cycles against scripted serial devices and a stubbed control
//! service.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pinbridge_driver::{command_channel, main_loop, Board};
use pinbridge_proto::{Action, Condition, PinType, Request, Response, Schedule};
use pinbridge_server::remote::RemoteError;
use pinbridge_server::{Bridge, Registry, RemoteService, Server};

struct ScriptedPort {
    script: VecDeque<Vec<u8>>,
    pending: Option<Vec<u8>>,
    writes: Arc<Mutex<Vec<String>>>,
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pending.take() {
            Some(reply) => {
                buf[..reply.len()].copy_from_slice(&reply);
                Ok(reply.len())
            }
            None => Ok(0),
        }
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(buf).into_owned());
        self.pending = self.script.pop_front();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Spawns a driver thread over a scripted port and returns its bridge plus
/// the log of frames the device saw.
fn spawn_device(port: &str, replies: &[&str]) -> (Bridge, Arc<Mutex<Vec<String>>>) {
    let writes = Arc::new(Mutex::new(Vec::new()));
    let scripted = ScriptedPort {
        script: replies.iter().map(|r| r.as_bytes().to_vec()).collect(),
        pending: None,
        writes: writes.clone(),
    };
    let board = Board::new(scripted, Duration::ZERO);

    let (send, recv) = command_channel();
    let name = port.to_string();
    thread::spawn(move || main_loop(&name, board, recv));

    (Bridge::new(port, send), writes)
}

#[derive(Default)]
struct StubState {
    schedule: RefCell<Option<Schedule>>,
    request: RefCell<Option<Request>>,
    done: RefCell<Vec<(u32, bool)>>,
    posted: RefCell<Vec<Response>>,
}

#[derive(Default, Clone)]
struct StubRemote(Rc<StubState>);

impl RemoteService for StubRemote {
    async fn fetch_schedule(&self) -> Result<Option<Schedule>, RemoteError> {
        Ok(self.0.schedule.borrow_mut().take())
    }

    async fn report_schedule_done(&self, id: u32, error: bool) -> Result<(), RemoteError> {
        self.0.done.borrow_mut().push((id, error));
        Ok(())
    }

    async fn fetch_request(&self) -> Result<Option<Request>, RemoteError> {
        Ok(self.0.request.borrow_mut().take())
    }

    async fn post_response(&self, response: &Response) -> Result<(), RemoteError> {
        self.0.posted.borrow_mut().push(response.clone());
        Ok(())
    }
}

fn schedule(port: &str, conditions: Vec<Condition>) -> Schedule {
    Schedule {
        id: 7,
        port: port.to_string(),
        pin_type: PinType::Digital,
        pin_number: 13,
        true_value: 1,
        false_value: 0,
        conditions,
    }
}

fn condition(port: &str, pin_type: PinType, pin_number: u8, sign: char, raw_value: i32) -> Condition {
    Condition {
        port: port.to_string(),
        pin_type,
        pin_number,
        sign,
        raw_value,
    }
}

fn frames(writes: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    writes.lock().unwrap().clone()
}

#[test]
fn schedule_for_unknown_port_reports_error_without_touching_devices() {
    let stub = StubRemote::default();
    *stub.0.schedule.borrow_mut() = Some(schedule("/dev/ghost", Vec::new()));

    let (bridge, writes) = spawn_device("/dev/real", &[]);
    let mut registry = Registry::new();
    registry.insert(bridge);

    let server = Server::new(stub.clone(), registry);
    smol::block_on(server.run_cycle()).unwrap();

    assert_eq!(*stub.0.done.borrow(), vec![(7, true)]);
    assert!(frames(&writes).is_empty());
}

#[test]
fn request_for_unknown_port_posts_error_under_its_correlation_id() {
    let stub = StubRemote::default();
    *stub.0.request.borrow_mut() = Some(Request {
        id: Some(42),
        port: "/dev/ghost".to_string(),
        action: Action::Set,
        pin_type: PinType::Digital,
        pin_number: 4,
        value: 1,
    });

    let server = Server::new(stub.clone(), Registry::new());
    smol::block_on(server.run_cycle()).unwrap();

    assert_eq!(*stub.0.posted.borrow(), vec![Response::error(Some(42))]);
}

#[test]
fn get_request_round_trips_the_decoded_level() {
    let stub = StubRemote::default();
    *stub.0.request.borrow_mut() = Some(Request {
        id: Some(42),
        port: "/dev/ttyACM0".to_string(),
        action: Action::Get,
        pin_type: PinType::Digital,
        pin_number: 7,
        value: 0,
    });

    let (bridge, writes) = spawn_device("/dev/ttyACM0", &["<RV=1>"]);
    let mut registry = Registry::new();
    registry.insert(bridge);

    let server = Server::new(stub.clone(), registry);
    smol::block_on(server.run_cycle()).unwrap();

    assert_eq!(frames(&writes), vec!["<GD07>"]);
    assert_eq!(
        *stub.0.posted.borrow(),
        vec![Response { request_id: Some(42), value: "1".to_string() }]
    );
}

#[test]
fn empty_guard_applies_the_true_value() {
    let stub = StubRemote::default();
    *stub.0.schedule.borrow_mut() = Some(schedule("/dev/ttyACM0", Vec::new()));

    let (bridge, writes) = spawn_device("/dev/ttyACM0", &["<RSET:OK>"]);
    let mut registry = Registry::new();
    registry.insert(bridge);

    let server = Server::new(stub.clone(), registry);
    smol::block_on(server.run_cycle()).unwrap();

    assert_eq!(frames(&writes), vec!["<SD131>"]);
    assert_eq!(*stub.0.done.borrow(), vec![(7, false)]);
}

#[test]
fn condition_boundary_is_inclusive() {
    // Reading equals the threshold: `>` still holds, the true value wins.
    let stub = StubRemote::default();
    *stub.0.schedule.borrow_mut() = Some(schedule(
        "/dev/main",
        vec![condition("/dev/probe", PinType::Analogue, 3, '>', 5)],
    ));

    let (main, main_writes) = spawn_device("/dev/main", &["<RSET:OK>"]);
    let (probe, probe_writes) = spawn_device("/dev/probe", &["<RV=0005>"]);
    let mut registry = Registry::new();
    registry.insert(main);
    registry.insert(probe);

    let server = Server::new(stub.clone(), registry);
    smol::block_on(server.run_cycle()).unwrap();

    assert_eq!(frames(&probe_writes), vec!["<GA03>"]);
    assert_eq!(frames(&main_writes), vec!["<SD131>"]);
    assert_eq!(*stub.0.done.borrow(), vec![(7, false)]);
}

#[test]
fn reading_below_the_threshold_fails_the_guard() {
    let stub = StubRemote::default();
    *stub.0.schedule.borrow_mut() = Some(schedule(
        "/dev/main",
        vec![condition("/dev/probe", PinType::Analogue, 3, '>', 5)],
    ));

    let (main, main_writes) = spawn_device("/dev/main", &["<RSET:OK>"]);
    let (probe, _) = spawn_device("/dev/probe", &["<RV=0004>"]);
    let mut registry = Registry::new();
    registry.insert(main);
    registry.insert(probe);

    let server = Server::new(stub.clone(), registry);
    smol::block_on(server.run_cycle()).unwrap();

    assert_eq!(frames(&main_writes), vec!["<SD130>"]);
    assert_eq!(*stub.0.done.borrow(), vec![(7, false)]);
}

#[test]
fn first_failing_condition_suppresses_the_rest() {
    let stub = StubRemote::default();
    *stub.0.schedule.borrow_mut() = Some(schedule(
        "/dev/dev",
        vec![
            condition("/dev/dev", PinType::Digital, 2, '=', 1),
            condition("/dev/dev", PinType::Digital, 3, '=', 1),
        ],
    ));

    // Only the first probe and the final set may reach the device; a second
    // probe would steal the set reply and show up in the frame log.
    let (bridge, writes) = spawn_device("/dev/dev", &["<RV=0>", "<RSET:OK>"]);
    let mut registry = Registry::new();
    registry.insert(bridge);

    let server = Server::new(stub.clone(), registry);
    smol::block_on(server.run_cycle()).unwrap();

    assert_eq!(frames(&writes), vec!["<GD02>", "<SD130>"]);
    assert_eq!(*stub.0.done.borrow(), vec![(7, false)]);
}

#[test]
fn unresolvable_condition_device_fails_the_guard() {
    let stub = StubRemote::default();
    *stub.0.schedule.borrow_mut() = Some(schedule(
        "/dev/main",
        vec![condition("/dev/ghost", PinType::Digital, 2, '=', 1)],
    ));

    let (main, main_writes) = spawn_device("/dev/main", &["<RSET:OK>"]);
    let mut registry = Registry::new();
    registry.insert(main);

    let server = Server::new(stub.clone(), registry);
    smol::block_on(server.run_cycle()).unwrap();

    // The guard fails, the false value is still applied and the schedule is
    // done without the error flag.
    assert_eq!(frames(&main_writes), vec!["<SD130>"]);
    assert_eq!(*stub.0.done.borrow(), vec![(7, false)]);
}

#[test]
fn garbled_get_reply_becomes_an_error_response() {
    let stub = StubRemote::default();
    *stub.0.request.borrow_mut() = Some(Request {
        id: Some(9),
        port: "/dev/ttyACM0".to_string(),
        action: Action::Get,
        pin_type: PinType::Analogue,
        pin_number: 1,
        value: 0,
    });

    let (bridge, _) = spawn_device("/dev/ttyACM0", &["<RV?>"]);
    let mut registry = Registry::new();
    registry.insert(bridge);

    let server = Server::new(stub.clone(), registry);
    smol::block_on(server.run_cycle()).unwrap();

    assert_eq!(*stub.0.posted.borrow(), vec![Response::error(Some(9))]);
}
