use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use grove_transport::{
    pipe, ProcessTransport, RemoteUrl, TcpOptions, TcpTransport, Transport, TransportError,
};

#[test]
fn tcp_sends_service_request_and_relays_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut len = [0u8; 4];
        socket.read_exact(&mut len).unwrap();
        let len = usize::from_str_radix(std::str::from_utf8(&len).unwrap(), 16).unwrap();
        let mut body = vec![0u8; len - 4];
        socket.read_exact(&mut body).unwrap();
        socket.write_all(b"hello").unwrap();
        body
    });

    let url = RemoteUrl::parse(&format!("git://127.0.0.1:{port}/project.git")).unwrap();
    let options = TcpOptions {
        connect_timeout: Duration::from_secs(5),
        io_timeout: Some(Duration::from_secs(5)),
    };
    let mut transport = TcpTransport::connect(&url, &options).unwrap();
    let mut reply = [0u8; 5];
    transport.reader().read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b"hello");

    let body = server.join().unwrap();
    assert_eq!(
        body,
        format!("git-upload-pack /project.git\0host=127.0.0.1:{port}\0").into_bytes()
    );
    Box::new(transport).close().unwrap();
}

#[test]
fn tcp_read_timeout_surfaces_as_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = std::thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        std::thread::sleep(Duration::from_millis(500));
        drop(socket);
    });
    let url = RemoteUrl::parse(&format!("git://127.0.0.1:{port}/x")).unwrap();
    let options = TcpOptions {
        connect_timeout: Duration::from_secs(5),
        io_timeout: Some(Duration::from_millis(50)),
    };
    let mut transport = TcpTransport::connect(&url, &options).unwrap();
    let mut byte = [0u8; 1];
    assert!(transport.reader().read(&mut byte).is_err());
    server.join().unwrap();
}

#[test]
fn refused_connection_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let url = RemoteUrl::parse(&format!("git://127.0.0.1:{port}/x")).unwrap();
    let err = TcpTransport::connect(&url, &TcpOptions::default()).unwrap_err();
    assert!(matches!(err, TransportError::ConnectionFailed(_)));
}

#[test]
fn duplex_pipe_supports_threads() {
    let (mut client, mut server) = pipe::duplex();
    let handle = std::thread::spawn(move || {
        let mut line = String::new();
        BufReader::new(server.reader()).read_line(&mut line).unwrap();
        server.writer().write_all(line.to_uppercase().as_bytes()).unwrap();
    });
    client.writer().write_all(b"want\n").unwrap();
    handle.join().unwrap();
    let mut reply = String::new();
    client.reader().read_to_string(&mut reply).unwrap();
    assert_eq!(reply, "WANT\n");
}

#[cfg(unix)]
#[test]
fn process_transport_round_trip_and_exit_status() {
    let mut transport = ProcessTransport::upload_pack("cat", "-").unwrap();
    transport.writer().write_all(b"echo me").unwrap();
    let boxed: Box<dyn Transport> = Box::new(transport);
    let mut transport = boxed;
    transport.writer().flush().unwrap();
    let mut buf = [0u8; 7];
    transport.reader().read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"echo me");
    transport.close().unwrap();

    let failing = ProcessTransport::upload_pack("sh -c", "echo broken >&2; exit 3").unwrap();
    let err = Box::new(failing).close().unwrap_err();
    match err {
        TransportError::ProcessFailed { code, stderr, .. } => {
            assert_eq!(code, 3);
            assert_eq!(stderr, "broken");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_program_fails_to_connect() {
    let err = ProcessTransport::upload_pack("definitely-not-a-real-program-xyz", "/tmp").err();
    assert!(matches!(err, Some(TransportError::ConnectionFailed(_))));
}
