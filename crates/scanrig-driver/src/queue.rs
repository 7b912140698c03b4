//! 命令队列
//!
//! 生产者（会话）与消费者（调度线程）之间唯一的并发边界。
//! 所有操作在同一把锁内完成：窥视与出队之间不会插入 `clear` 或急停。

use parking_lot::Mutex;
use scanrig_protocol::Command;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// 队首命令的闸门判定结果
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// 队列为空
    Empty,
    /// 队首命令被闸门挡住，留在队列中；附带队首纪元
    Held(u64),
    /// 已出队的命令
    Released(Command),
}

#[derive(Debug, Default)]
struct Inner {
    commands: VecDeque<Command>,
    /// 队首每换一条命令加一
    head_epoch: u64,
}

impl Inner {
    fn remove_all(&mut self) -> usize {
        let discarded = self.commands.len();
        if discarded > 0 {
            self.commands.clear();
            self.head_epoch = self.head_epoch.wrapping_add(1);
        }
        discarded
    }

    fn push_back(&mut self, command: Command) {
        if self.commands.is_empty() {
            self.head_epoch = self.head_epoch.wrapping_add(1);
        }
        self.commands.push_back(command);
    }

    fn pop_front(&mut self) -> Option<Command> {
        let command = self.commands.pop_front()?;
        self.head_epoch = self.head_epoch.wrapping_add(1);
        Some(command)
    }
}

/// 线程安全 FIFO
#[derive(Debug, Default)]
pub struct CommandQueue {
    inner: Mutex<Inner>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        self.inner.lock().push_back(command);
    }

    /// 批量入队（保持顺序，整批一次加锁）
    pub fn extend<I>(&self, commands: I) -> usize
    where
        I: IntoIterator<Item = Command>,
    {
        let mut queue = self.inner.lock();
        let before = queue.commands.len();
        for command in commands {
            queue.push_back(command);
        }
        queue.commands.len() - before
    }

    /// 查看队首命令（克隆）
    pub fn peek(&self) -> Option<Command> {
        self.inner.lock().commands.front().cloned()
    }

    pub fn pop(&self) -> Option<Command> {
        self.inner.lock().pop_front()
    }

    /// 按闸门条件出队
    ///
    /// `release` 以队首命令及其纪元调用，返回 `true` 时出队，否则命令留在队首。
    pub fn pop_if<F>(&self, release: F) -> Gate
    where
        F: FnOnce(&Command, u64) -> bool,
    {
        let mut queue = self.inner.lock();
        let epoch = queue.head_epoch;
        match queue.commands.front() {
            None => Gate::Empty,
            Some(head) if !release(head, epoch) => Gate::Held(epoch),
            Some(_) => queue.pop_front().map_or(Gate::Empty, Gate::Released),
        }
    }

    /// 清空队列，返回丢弃的命令数
    pub fn clear(&self) -> usize {
        self.inner.lock().remove_all()
    }

    /// `flag` 已置位时复位它并清空队列
    ///
    /// 与 [`replace_with_reset`](Self::replace_with_reset) 在同一把锁内串行。
    pub fn clear_if_set(&self, flag: &AtomicBool) -> Option<usize> {
        let mut queue = self.inner.lock();
        flag.swap(false, Ordering::AcqRel).then(|| queue.remove_all())
    }

    /// 清空后放入单条命令（原子操作）
    pub fn replace_with(&self, command: Command) -> usize {
        let mut queue = self.inner.lock();
        let discarded = queue.remove_all();
        queue.push_back(command);
        discarded
    }

    /// 同 [`replace_with`](Self::replace_with)，并在锁内复位 `flag`
    ///
    /// 之后的 [`clear_if_set`](Self::clear_if_set) 不会再丢弃新放入的命令。
    pub fn replace_with_reset(&self, command: Command, flag: &AtomicBool) -> usize {
        let mut queue = self.inner.lock();
        flag.store(false, Ordering::Release);
        let discarded = queue.remove_all();
        queue.push_back(command);
        discarded
    }

    pub fn len(&self) -> usize {
        self.inner.lock().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().commands.is_empty()
    }

    /// 队列内容快照
    pub fn snapshot(&self) -> Vec<Command> {
        self.inner.lock().commands.iter().cloned().collect()
    }
}
