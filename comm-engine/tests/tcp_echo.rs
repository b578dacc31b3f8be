mod common;

use comm_core::CommConfig;
use comm_engine::{Comm, CommState, Direction};
use comm_transport::{TcpTransport, Transport};
use common::{collector, wait_until};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Echo every byte back until the client goes away
fn echo_server() -> (String, JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut buf = [0u8; 512];
        let mut echoed = 0;
        loop {
            match socket.read(&mut buf) {
                Ok(0) | Err(_) => return echoed,
                Ok(n) => {
                    socket.write_all(&buf[..n]).unwrap();
                    echoed += n;
                }
            }
        }
    });
    (address, handle)
}

#[test]
fn test_echo_round_trip() {
    let (address, server) = echo_server();
    let comm = Comm::with_config(
        TcpTransport::from_address(&address).unwrap(),
        CommConfig::new().with_write_chunk_size(100),
    );
    let (received, callback) = collector();
    comm.register_receive_callback(callback).unwrap();
    comm.init().unwrap();

    let payload: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 256) as u8).collect();
    comm.send_bytes(&payload[..1000]);
    comm.send_bytes(&payload[1000..]);

    wait_until("echo", || {
        received.lock().unwrap().iter().map(Vec::len).sum::<usize>() == payload.len()
    });
    assert_eq!(received.lock().unwrap().concat(), payload);
    assert_eq!(comm.statistics().chunks_sent, 30);

    comm.close();
    assert_eq!(comm.state(), CommState::Stopped);
    assert!(!comm.transport().is_open());
    assert_eq!(server.join().unwrap(), payload.len());
}

#[test]
fn test_peer_hang_up_then_close_ends_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (hung_up_tx, hung_up_rx) = mpsc::channel();
    let server = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        socket.write_all(b"goodbye").unwrap();
        socket.shutdown(Shutdown::Write).unwrap();
        hung_up_tx.send(()).unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 16];
        socket.read(&mut buf)
    });

    let comm = Comm::new(TcpTransport::from_address(&address).unwrap());
    let (received, callback) = collector();
    comm.register_receive_callback(callback).unwrap();
    comm.init().unwrap();
    hung_up_rx.recv().unwrap();

    wait_until("stopped", || comm.state() == CommState::Stopped);
    assert_eq!(comm.fault().unwrap().direction, Direction::Read);
    assert!(!comm.transport().is_open());

    let stats = comm.statistics();
    assert_eq!(stats.bytes_received, 7);
    assert!(stats.reads_completed >= 1);
    assert_eq!(stats.callbacks_dispatched + stats.reads_discarded, stats.reads_completed);
    let delivered = received.lock().unwrap().concat();
    if stats.reads_discarded == 0 {
        assert_eq!(delivered, b"goodbye");
    } else {
        assert!(delivered.len() < 7);
        assert!(b"goodbye".starts_with(&delivered));
    }

    // the stream is still held after end of stream; close must release it
    comm.close();
    assert_eq!(server.join().unwrap().unwrap(), 0);
}

#[test]
fn test_connect_refused() {
    // grab a free port, then release it so nothing listens there
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let comm = Comm::new(TcpTransport::from_address(&address).unwrap());
    assert!(comm.init().is_err());
    assert_eq!(comm.state(), CommState::Created);
}

#[test]
fn test_close_after_shutdown_ends_connection() {
    let (address, server) = echo_server();
    let comm = Comm::new(TcpTransport::from_address(&address).unwrap());
    comm.init().unwrap();
    comm.shutdown();
    assert!(comm.transport().is_open());

    comm.close();
    assert!(!comm.transport().is_open());
    assert_eq!(server.join().unwrap(), 0);

    // the server is gone once the connection ended
    assert!(TcpStream::connect(&address).is_err());
}
