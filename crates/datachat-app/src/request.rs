// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{ApiError, RequestTicket};

/// Loading/result/error lifecycle of one endpoint. Only the latest ticket may settle.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    last_result: Option<T>,
    in_flight: bool,
    last_error: Option<ApiError>,
    error_reported: bool,
    latest: Option<RequestTicket>,
    next_ticket: RequestTicket,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            last_result: None,
            in_flight: false,
            last_error: None,
            error_reported: true,
            latest: None,
            next_ticket: RequestTicket::new(1),
        }
    }
}

impl<T: Clone> RequestState<T> {
    pub fn last_result(&self) -> Option<&T> {
        self.last_result.as_ref()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    pub fn begin(&mut self) -> RequestTicket {
        let ticket = self.next_ticket.advance();
        self.latest = Some(ticket);
        self.in_flight = true;
        self.last_error = None;
        self.error_reported = true;
        ticket
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest == Some(ticket)
    }

    pub fn settle(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<T, ApiError>,
    ) -> Option<Result<T, ApiError>> {
        if !self.is_current(ticket) {
            return None;
        }
        self.in_flight = false;
        match &outcome {
            Ok(result) => {
                self.last_result = Some(result.clone());
                self.last_error = None;
            }
            Err(error) => self.store_error(error.clone()),
        }
        Some(outcome)
    }

    pub fn reject(&mut self, error: ApiError) {
        self.store_error(error);
    }

    pub fn take_unreported_error(&mut self) -> Option<ApiError> {
        if self.error_reported {
            return None;
        }
        self.error_reported = true;
        self.last_error.clone()
    }

    pub fn mark_error_reported(&mut self) {
        self.error_reported = true;
    }

    fn store_error(&mut self, error: ApiError) {
        self.last_result = None;
        self.last_error = Some(error);
        self.error_reported = false;
    }
}
