//! Requests delivered to a container and their single reply.

use tokio::sync::oneshot;

use warden_core::{Error, RequestKind, RequestPayload, Response, Result};

/// Receiving end of a request's reply.
pub type ResponseReceiver = oneshot::Receiver<Result<Response>>;

/// A request in flight to a container.
///
/// Exactly one of `write_response` / `write_error` takes effect; later writes
/// are ignored. The completion notification fires once, after the reply is
/// written or when the request is dropped unanswered.
#[derive(Debug)]
pub struct Request {
    payload: RequestPayload,
    reply: Option<oneshot::Sender<Result<Response>>>,
    done: Option<oneshot::Sender<()>>,
    completion: Option<oneshot::Receiver<()>>,
}

impl Request {
    pub fn new(payload: impl Into<RequestPayload>) -> (Self, ResponseReceiver) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let request = Self {
            payload: payload.into(),
            reply: Some(reply_tx),
            done: Some(done_tx),
            completion: Some(done_rx),
        };
        (request, reply_rx)
    }

    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    pub fn kind(&self) -> RequestKind {
        self.payload.kind()
    }

    /// Take the completion notification. Only the first caller gets it.
    pub fn completion(&mut self) -> Option<oneshot::Receiver<()>> {
        self.completion.take()
    }

    /// Whether a reply has been written.
    pub fn is_answered(&self) -> bool {
        self.reply.is_none()
    }

    pub fn write_response(&mut self, response: Response) {
        self.write(Ok(response));
    }

    pub fn write_error(&mut self, error: Error) {
        self.write(Err(error));
    }

    fn write(&mut self, result: Result<Response>) {
        let Some(reply) = self.reply.take() else {
            tracing::warn!(kind = %self.kind(), "Ignoring second reply to request");
            return;
        };

        // The caller may have given up waiting
        let _ = reply.send(result);

        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{CreateResponse, DestroyRequest, StopRequest};

    #[tokio::test]
    async fn test_first_write_wins() {
        let (mut request, rx) = Request::new(DestroyRequest {});
        let done = request.completion().unwrap();
        assert!(request.completion().is_none());

        request.write_response(Response::Create(CreateResponse {
            handle: "h".into(),
        }));
        request.write_error(Error::NotAccepting);
        assert!(request.is_answered());

        let reply = rx.await.unwrap().unwrap();
        assert_eq!(reply, Response::Create(CreateResponse { handle: "h".into() }));
        assert!(done.await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_request_still_completes() {
        let (mut request, rx) = Request::new(StopRequest::default());
        let done = request.completion().unwrap();
        drop(request);

        // Completion resolves (as closed) and the caller sees a dropped reply
        assert!(done.await.is_err());
        assert!(rx.await.is_err());
    }
}
