//! Tests for error types.

use super::*;

#[test]
fn test_transport_error_keeps_service_details() {
    let error = QueueTransportError::new("QueueNotExist", "The queue name you provided is not exist.")
        .with_request_id("5F3A7C2B1D")
        .with_status(404);

    assert_eq!(error.code(), "QueueNotExist");
    assert_eq!(error.message(), "The queue name you provided is not exist.");
    assert_eq!(error.request_id(), Some("5F3A7C2B1D"));
    assert_eq!(error.status(), Some(404));
    assert_eq!(
        error.to_string(),
        "QueueNotExist - The queue name you provided is not exist."
    );
}

#[test]
fn test_message_not_exist_detection() {
    assert!(QueueTransportError::new("MessageNotExist", "empty").is_message_not_exist());
    assert!(!QueueTransportError::new("QueueNotExist", "gone").is_message_not_exist());
}

#[test]
fn test_transport_error_transience() {
    assert!(QueueTransportError::new(QueueTransportError::NETWORK_ERROR, "reset").is_transient());
    assert!(QueueTransportError::new("InternalError", "oops").is_transient());
    assert!(QueueTransportError::new("Whatever", "bad gateway")
        .with_status(502)
        .is_transient());

    assert!(!QueueTransportError::new("AccessDenied", "no")
        .with_status(403)
        .is_transient());
    assert!(!QueueTransportError::malformed("not xml").is_transient());
}

#[test]
fn test_worker_error_transience() {
    let transport: WorkerError =
        QueueTransportError::new(QueueTransportError::NETWORK_ERROR, "timeout").into();
    assert!(transport.is_transient());

    let config: WorkerError = ConfigurationError::missing("endpoint").into();
    assert!(!config.is_transient());

    let handler: WorkerError = HandlerError::new("boom").into();
    assert!(!handler.is_transient());

    let argument = WorkerError::InvalidArgument {
        arg: "body".to_string(),
        message: "not UTF-8".to_string(),
    };
    assert!(!argument.is_transient());
}

#[test]
fn test_unsupported_operation_message() {
    let error = UnsupportedOperationError {
        operation: "status",
        transport: "MNS",
    };

    assert_eq!(
        error.to_string(),
        "Operation 'status' is not supported by the MNS transport"
    );
}

#[test]
fn test_handler_error_exposes_source() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let error = HandlerError::with_source("could not write job", io);

    assert_eq!(error.message(), "could not write job");
    assert!(std::error::Error::source(&error).is_some());
}
