use crate::model::{DeviceId, UserId};

/// Who is sending. Passed explicitly into the assembler and dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user: UserId,
    pub device: DeviceId,
}

impl SessionContext {
    pub fn new(user: impl Into<UserId>, device: impl Into<DeviceId>) -> Self {
        Self {
            user: user.into(),
            device: device.into(),
        }
    }

    pub fn is_self(&self, user: &UserId, device: &DeviceId) -> bool {
        &self.user == user && &self.device == device
    }
}
