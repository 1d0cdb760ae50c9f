//! End-to-end runs over loopback: a real controller serving real workers
//! in-process, plus raw-socket clients poking at the protocol edges.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use gridcrack_controller::server::{RunSummary, Server, ServerConfig};
use gridcrack_core::candidates;
use gridcrack_core::crypt;
use gridcrack_core::messages::{Algorithm, ChunkAssign, CrackJob, HeartbeatResponse};
use gridcrack_core::wire::{self, Frame};
use gridcrack_worker::{run as run_worker, WorkerConfig};

const TEST_TIMEOUT: Duration = Duration::from_secs(60);

fn md5_job(password: &str, salt: &str) -> CrackJob {
    let template = Algorithm::Md5.salt_template(salt);
    let hash = crypt::crypt(password, &template).expect("md5 crypt");
    let digest = crypt::digest_suffix(&hash, Algorithm::Md5).expect("digest");
    CrackJob {
        algorithm: Algorithm::Md5,
        salt: salt.to_owned(),
        target_hash: digest.to_owned(),
    }
}

async fn start_server(job: CrackJob, heartbeat: Duration, chunk_size: u64) -> (u16, tokio::task::JoinHandle<anyhow::Result<RunSummary>>) {
    let server = Server::bind(
        ServerConfig {
            port: 0,
            heartbeat_interval: heartbeat,
            chunk_size,
        },
        job,
    )
    .await
    .expect("bind");
    let port = server.local_addr().expect("local addr").port();
    (port, tokio::spawn(server.run()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_worker_finds_a_single_char_password() {
    // 'A' is alphabet offset 32, inside the first chunk of 50.
    let (port, server) = start_server(md5_job("A", "xy"), Duration::from_secs(60), 50).await;

    let outcome = timeout(
        TEST_TIMEOUT,
        run_worker(WorkerConfig {
            controller: "127.0.0.1".into(),
            port,
            threads: 2,
        }),
    )
    .await
    .expect("worker timed out")
    .expect("worker failed");

    assert!(outcome.found);
    assert_eq!(outcome.password.as_deref(), Some("A"));

    let summary = timeout(TEST_TIMEOUT, server)
        .await
        .expect("server timed out")
        .expect("server panicked")
        .expect("server failed");
    let result = summary.result.expect("result latched");
    assert_eq!(result.password, "A");
    assert!(result.crack_time_ms > 0.0);
    // Exactly one chunk was handed out before the find.
    assert_eq!(summary.chunks_assigned, 1);
    assert_eq!(summary.candidates_dispatched, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn two_workers_race_and_exactly_one_finds() {
    // Plant the password at a known global index a few chunks in, so
    // both workers pull work before the find.
    let target = candidates::index_to_password(1_500).expect("in range");
    let (port, server) = start_server(md5_job(&target, "ab"), Duration::from_secs(60), 400).await;

    let config = WorkerConfig {
        controller: "127.0.0.1".into(),
        port,
        threads: 2,
    };
    let (a, b) = timeout(TEST_TIMEOUT, async {
        tokio::join!(run_worker(config.clone()), run_worker(config))
    })
    .await
    .expect("workers timed out");
    let a = a.expect("worker a failed");
    let b = b.expect("worker b failed");

    assert_eq!(
        [a.found, b.found].iter().filter(|f| **f).count(),
        1,
        "exactly one worker reports the find"
    );
    let winner = if a.found { &a } else { &b };
    assert_eq!(winner.password.as_deref(), Some(target.as_str()));

    let summary = timeout(TEST_TIMEOUT, server)
        .await
        .expect("server timed out")
        .expect("server panicked")
        .expect("server failed");
    assert_eq!(summary.result.expect("latched").password, target);
    assert_eq!(summary.workers_seen, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn raw_client_walks_the_protocol_and_chunks_advance() {
    let job = md5_job("A", "xy");
    let (port, server) = start_server(job.clone(), Duration::from_secs(60), 10_000).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");

    wire::write_frame(&mut stream, &Frame::Register).await.expect("register");
    match timeout(TEST_TIMEOUT, wire::read_frame(&mut stream))
        .await
        .expect("job timed out")
        .expect("job frame")
    {
        Frame::Job(received) => assert_eq!(received, job),
        other => panic!("expected job, got {other:?}"),
    }

    for expected_start in [0u64, 10_000] {
        wire::write_frame(&mut stream, &Frame::RequestChunk).await.expect("request");
        match timeout(TEST_TIMEOUT, wire::read_frame(&mut stream))
            .await
            .expect("chunk timed out")
            .expect("chunk frame")
        {
            Frame::ChunkAssign(ChunkAssign { start_idx, count }) => {
                assert_eq!(start_idx, expected_start);
                assert_eq!(count, 10_000);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    // Die mid-chunk: the controller must not crash, must not reassign,
    // and with no workers left the run ends without a find.
    drop(stream);

    let summary = timeout(TEST_TIMEOUT, server)
        .await
        .expect("server timed out")
        .expect("server panicked")
        .expect("server failed");
    assert!(summary.result.is_none());
    assert_eq!(summary.workers_seen, 1);
    assert_eq!(summary.chunks_assigned, 2);
    // The lost chunks stay lost; the cursor does not roll back.
    assert_eq!(summary.candidates_dispatched, 20_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn junk_before_registration_drops_the_connection() {
    let (port, server) = start_server(md5_job("A", "xy"), Duration::from_secs(60), 100).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    // A well-formed frame, but not a registration.
    wire::write_frame(&mut stream, &Frame::RequestChunk).await.ok();

    let summary = timeout(TEST_TIMEOUT, server)
        .await
        .expect("server timed out")
        .expect("server panicked")
        .expect("server failed");
    assert!(summary.result.is_none());
    assert_eq!(summary.workers_seen, 1);
    assert_eq!(summary.chunks_assigned, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn heartbeats_reach_a_registered_worker() {
    let (port, server) = start_server(md5_job("A", "xy"), Duration::from_millis(200), 100).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    wire::write_frame(&mut stream, &Frame::Register).await.expect("register");
    match timeout(TEST_TIMEOUT, wire::read_frame(&mut stream))
        .await
        .expect("job timed out")
        .expect("job frame")
    {
        Frame::Job(_) => {}
        other => panic!("expected job, got {other:?}"),
    }

    // Idle through two heartbeat periods, answering each request.
    for expected_total in [40u64, 90] {
        match timeout(TEST_TIMEOUT, wire::read_frame(&mut stream))
            .await
            .expect("heartbeat timed out")
            .expect("heartbeat frame")
        {
            Frame::HeartbeatReq => {}
            other => panic!("expected heartbeat request, got {other:?}"),
        }
        let sample = HeartbeatResponse {
            delta_tested: expected_total.min(50),
            total_tested: expected_total,
            threads_active: 2,
            current_rate: 123.0,
        };
        wire::write_frame(&mut stream, &Frame::HeartbeatResp(sample))
            .await
            .expect("heartbeat response");
    }
    drop(stream);

    let summary = timeout(TEST_TIMEOUT, server)
        .await
        .expect("server timed out")
        .expect("server panicked")
        .expect("server failed");
    assert!(summary.heartbeats_sent >= 2);
    assert_eq!(summary.heartbeats_received, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bcrypt_worker_answers_heartbeats_while_cracking() {
    // bcrypt at cost 8 is slow enough that several heartbeat periods
    // elapse before the find at alphabet offset 9 ('*').
    let salt = "08$abcdefghijklmnopqrstuv";
    let template = Algorithm::Bcrypt.salt_template(salt);
    let hash = crypt::crypt("*", &template).expect("bcrypt crypt");
    let digest = crypt::digest_suffix(&hash, Algorithm::Bcrypt).expect("digest");
    let job = CrackJob {
        algorithm: Algorithm::Bcrypt,
        salt: salt.to_owned(),
        target_hash: digest.to_owned(),
    };

    let (port, server) = start_server(job, Duration::from_millis(50), 100).await;

    let outcome = timeout(
        TEST_TIMEOUT,
        run_worker(WorkerConfig {
            controller: "127.0.0.1".into(),
            port,
            threads: 1,
        }),
    )
    .await
    .expect("worker timed out")
    .expect("worker failed");

    assert!(outcome.found);
    assert_eq!(outcome.password.as_deref(), Some("*"));

    let summary = timeout(TEST_TIMEOUT, server)
        .await
        .expect("server timed out")
        .expect("server panicked")
        .expect("server failed");
    assert_eq!(summary.result.expect("latched").password, "*");
    assert!(summary.heartbeats_received >= 1, "reader answered no heartbeats");
}
