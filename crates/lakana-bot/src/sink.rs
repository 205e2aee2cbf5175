//! Notification sink that writes to the log.

use lakana_sync::{
    Announcement, ApplicantId, ChannelId, DeliveryError, NoticeParams, NotificationSink,
    TemplateKey,
};
use tracing::info;

/// Logs every message instead of delivering it to a chat platform.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(
        &self,
        applicant: ApplicantId,
        template: TemplateKey,
        params: &NoticeParams,
    ) -> Result<(), DeliveryError> {
        info!(%applicant, %template, "{}", params.render(template));
        Ok(())
    }

    fn announce(&self, channel: ChannelId, announcement: &Announcement) -> Result<(), DeliveryError> {
        info!(%channel, "{}", announcement.text());
        Ok(())
    }
}
