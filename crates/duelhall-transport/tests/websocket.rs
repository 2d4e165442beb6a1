//! Integration tests for the WebSocket listener.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a tokio-tungstenite client.

#[cfg(feature = "websocket")]
mod websocket {
    use duelhall_transport::{Connection, WebSocketListener};
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test]
    async fn test_accept_splits_into_writer_and_reader() {
        let listener = WebSocketListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("bound address");

        let server = tokio::spawn(async move { listener.accept().await.expect("should accept") });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");

        let (conn, mut reader) = server.await.expect("task should complete");
        assert_eq!(conn.id(), reader.id());

        conn.send(br#"{"type":"Crowd","count":1}"#)
            .await
            .expect("server send");
        let frame = client.next().await.expect("frame").expect("ok frame");
        assert_eq!(frame.into_text().expect("text").as_str(), r#"{"type":"Crowd","count":1}"#);

        client
            .send(Message::Text("hello".into()))
            .await
            .expect("client send");
        let received = reader.recv().await.expect("recv").expect("some frame");
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn test_reader_returns_none_when_client_closes() {
        let listener = WebSocketListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("bound address");
        let server = tokio::spawn(async move { listener.accept().await.expect("should accept") });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let (_conn, mut reader) = server.await.expect("task should complete");

        client.close(None).await.expect("client close");
        assert!(reader.recv().await.expect("clean close").is_none());
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let listener = WebSocketListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("bound address");
        let server = tokio::spawn(async move {
            let a = listener.accept().await.expect("first");
            let b = listener.accept().await.expect("second");
            (a.0.id(), b.0.id())
        });

        let _c1 = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("first client");
        let _c2 = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("second client");

        let (a, b) = server.await.expect("task should complete");
        assert_ne!(a, b);
    }
}
