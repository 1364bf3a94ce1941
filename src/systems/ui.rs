//! 消息系统：收集叙述文本，与渲染无关

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use error::Result;

use super::System;
use crate::event_bus::{EventKind, GameEvent, MessageCategory, SharedBus};

#[derive(Debug, Clone, PartialEq)]
pub struct UiMessage {
    pub text: String,
    pub category: MessageCategory,
    pub timestamp: SystemTime,
}

pub struct UISystem {
    bus: SharedBus,
    messages: Mutex<VecDeque<UiMessage>>,
    max_messages: usize,
    partial_clear_keep: usize,
}

impl UISystem {
    pub fn new(bus: SharedBus, max_messages: usize, partial_clear_keep: usize) -> Self {
        let max_messages = max_messages.max(1);
        Self {
            bus,
            messages: Mutex::new(VecDeque::with_capacity(max_messages)),
            max_messages,
            partial_clear_keep,
        }
    }

    fn messages(&self) -> MutexGuard<'_, VecDeque<UiMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 按时间顺序（最旧在前）返回副本
    pub fn current_messages(&self) -> Vec<UiMessage> {
        self.messages().iter().cloned().collect()
    }

    /// 最新的在前
    pub fn message_texts(&self) -> Vec<String> {
        self.messages().iter().rev().map(|m| m.text.clone()).collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages().len()
    }

    pub fn add_message(&self, text: impl Into<String>, category: MessageCategory) -> Result<()> {
        self.bus.publish(&GameEvent::Message {
            text: text.into(),
            category,
        })
    }

    pub fn clear_messages(&self, clear_all: bool) -> Result<()> {
        self.bus.publish(&GameEvent::ClearMessages { clear_all })
    }

    fn push(&self, text: &str, category: MessageCategory) {
        let mut messages = self.messages();
        while messages.len() >= self.max_messages {
            messages.pop_front();
        }
        messages.push_back(UiMessage {
            text: text.to_string(),
            category,
            timestamp: SystemTime::now(),
        });
    }

    fn clear(&self, clear_all: bool) {
        let mut messages = self.messages();
        if clear_all {
            messages.clear();
            return;
        }
        let excess = messages.len().saturating_sub(self.partial_clear_keep);
        messages.drain(..excess);
    }
}

impl System for UISystem {
    fn name(&self) -> &str {
        "UISystem"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Message, EventKind::ClearMessages]
    }

    fn handle_event(&self, event: &GameEvent) -> Result<()> {
        match event {
            GameEvent::Message { text, category } => self.push(text, *category),
            GameEvent::ClearMessages { clear_all } => self.clear(*clear_all),
            _ => {}
        }
        Ok(())
    }
}
